use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::source::dexscreener::DEFAULT_HOST;
use crate::types::{GrowthConfig, PLACEHOLDER_ASSET_ID};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub asset_id: String,
    pub api_host: String,
    pub chain: String,

    pub target_mc: f64,
    pub min_size: u32,
    pub max_size: u32,
    pub log_floor: f64,

    pub refresh_ms: u64,
    pub request_timeout_ms: u64,

    // RFC 3339 or YYYY-MM-DD
    pub campaign_start: Option<String>,
    // comma separated
    pub milestones: String,

    pub community_url: Option<String>,

    // Stats
    pub stats_log_sec: u64,
    pub state_jsonl_path: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(config::Environment::default())
    }

    fn from_source<S>(source: S) -> anyhow::Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let c = config::Config::builder()
            .set_default("asset_id", PLACEHOLDER_ASSET_ID)?
            .set_default("api_host", DEFAULT_HOST)?
            .set_default("chain", "solana")?
            .set_default("target_mc", 10_000_000.0)?
            .set_default("min_size", 200)?
            .set_default("max_size", 600)?
            .set_default("log_floor", 10_000.0)?
            .set_default("refresh_ms", 45_000)?
            .set_default("request_timeout_ms", 10_000)?
            .set_default("milestones", "100000,500000,1000000,5000000,10000000")?
            .set_default("stats_log_sec", 300)?
            .add_source(source)
            .build()?;
        Ok(c.try_deserialize()?)
    }

    /// Validate and freeze into the config every refresh uses. `now` stands in
    /// for a missing campaign start.
    pub fn growth_config(&self, now: DateTime<Utc>) -> anyhow::Result<GrowthConfig> {
        if !self.target_mc.is_finite() || self.target_mc <= 0.0 {
            anyhow::bail!("target_mc must be positive, got {}", self.target_mc);
        }
        if !self.log_floor.is_finite() || self.log_floor <= 0.0 {
            anyhow::bail!("log_floor must be positive, got {}", self.log_floor);
        }
        if self.log_floor >= self.target_mc {
            anyhow::bail!(
                "log_floor ({}) must be below target_mc ({})",
                self.log_floor,
                self.target_mc
            );
        }
        if self.max_size < self.min_size {
            anyhow::bail!("max_size ({}) below min_size ({})", self.max_size, self.min_size);
        }
        if self.refresh_ms == 0 {
            anyhow::bail!("refresh_ms must be > 0");
        }

        let start = match self.campaign_start.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => parse_start(s).with_context(|| format!("invalid campaign_start {:?}", s))?,
            None => {
                tracing::warn!("campaign_start not set, counting days from now");
                now
            }
        };

        Ok(GrowthConfig {
            asset_id: self.asset_id.trim().to_string(),
            min_size: self.min_size,
            max_size: self.max_size,
            target: self.target_mc,
            log_floor: self.log_floor,
            refresh: Duration::from_millis(self.refresh_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms.max(1)),
            start,
            milestones: parse_milestones(&self.milestones)?,
        })
    }
}

fn parse_start(s: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let d = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    d.and_hms_opt(0, 0, 0)
        .map(|n| n.and_utc())
        .context("midnight out of range")
}

fn parse_milestones(s: &str) -> anyhow::Result<Vec<f64>> {
    let mut out: Vec<f64> = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let v: f64 = part
            .replace('_', "")
            .parse()
            .with_context(|| format!("invalid milestone {:?}", part))?;
        if !v.is_finite() || v <= 0.0 {
            anyhow::bail!("milestone must be positive, got {}", part);
        }
        out.push(v);
    }
    out.sort_by(|a, b| a.total_cmp(b));
    out.dedup();
    Ok(out)
}
