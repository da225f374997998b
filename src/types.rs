use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Asset id value that means "not filled in yet".
pub const PLACEHOLDER_ASSET_ID: &str = "YOUR_CONTRACT_ADDRESS_HERE";

/// Ratio between the rendered height and width of the growth visual.
pub const HEIGHT_RATIO: f64 = 0.8;

/// Immutable growth settings, built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct GrowthConfig {
    pub asset_id: String,
    pub min_size: u32,
    pub max_size: u32,
    pub target: f64,
    /// Valuation where the log curve starts (size == min_size at and below it).
    pub log_floor: f64,
    pub refresh: Duration,
    pub request_timeout: Duration,
    pub start: DateTime<Utc>,
    /// Ascending, deduplicated.
    pub milestones: Vec<f64>,
}

impl GrowthConfig {
    pub fn is_unconfigured(&self) -> bool {
        let id = self.asset_id.trim();
        id.is_empty() || id == PLACEHOLDER_ASSET_ID
    }
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            asset_id: PLACEHOLDER_ASSET_ID.to_string(),
            min_size: 200,
            max_size: 600,
            target: 10_000_000.0,
            log_floor: 10_000.0,
            refresh: Duration::from_millis(45_000),
            request_timeout: Duration::from_millis(10_000),
            start: DateTime::<Utc>::UNIX_EPOCH,
            milestones: vec![100_000.0, 500_000.0, 1_000_000.0, 5_000_000.0, 10_000_000.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Milestone {
    pub threshold: f64,
    pub achieved: bool,
}

/// Linear days-to-target estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectedDays {
    Days(u64),
    Unbounded,
}

impl Serialize for ProjectedDays {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            ProjectedDays::Days(d) => s.serialize_u64(*d),
            ProjectedDays::Unbounded => s.serialize_str("unbounded"),
        }
    }
}

impl std::fmt::Display for ProjectedDays {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectedDays::Days(d) => write!(f, "{}", d),
            ProjectedDays::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Everything the presentation layer needs for one valuation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualState {
    pub valuation: f64,
    pub size: u32,
    pub progress: f64,
    pub milestones: Vec<Milestone>,
    pub days_active: u64,
    pub projected_days: ProjectedDays,
}

impl VisualState {
    pub fn achieved(&self) -> impl Iterator<Item = f64> + '_ {
        self.milestones.iter().filter(|m| m.achieved).map(|m| m.threshold)
    }
}
