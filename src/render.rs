use async_trait::async_trait;
use serde::Serialize;

use crate::error::FetchError;
use crate::growth::format_percent;
use crate::types::{ProjectedDays, VisualState, HEIGHT_RATIO};

/// `2.50M`, `1.50K`, `42.00`.
pub fn format_number(num: f64) -> String {
    if num >= 1_000_000.0 {
        format!("{:.2}M", num / 1_000_000.0)
    } else if num >= 1_000.0 {
        format!("{:.2}K", num / 1_000.0)
    } else {
        format!("{:.2}", num)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneView {
    pub threshold: f64,
    pub label: String,
    pub achieved: bool,
}

/// What a presentation layer receives for one successful refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPayload {
    pub size: u32,
    pub height: f64,
    pub height_ratio: f64,
    pub progress_percent: String,
    pub progress_bar_percent: f64,
    pub milestones_achieved: Vec<f64>,
    pub milestones: Vec<MilestoneView>,
    pub days_active: u64,
    pub projected_days: ProjectedDays,
    pub display_value: String,
}

impl From<&VisualState> for RenderPayload {
    fn from(s: &VisualState) -> Self {
        Self {
            size: s.size,
            height: f64::from(s.size) * HEIGHT_RATIO,
            height_ratio: HEIGHT_RATIO,
            progress_percent: format_percent(s.progress),
            progress_bar_percent: s.progress,
            milestones_achieved: s.achieved().collect(),
            milestones: s
                .milestones
                .iter()
                .map(|m| MilestoneView {
                    threshold: m.threshold,
                    label: format!("${}", format_number(m.threshold)),
                    achieved: m.achieved,
                })
                .collect(),
            days_active: s.days_active,
            projected_days: s.projected_days,
            display_value: format!("${}", format_number(s.valuation)),
        }
    }
}

/// One published refresh result. `Unavailable` is distinct from a zero
/// valuation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Update {
    Published(RenderPayload),
    Unavailable { label: String, reason: String },
}

impl Update {
    pub fn unavailable(err: &FetchError) -> Self {
        Update::Unavailable {
            label: err.display_label().to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, update: &Update);
}

/// Writes each update to the tracing output.
#[derive(Clone, Default)]
pub struct LogRenderer;

#[async_trait]
impl Renderer for LogRenderer {
    async fn render(&self, update: &Update) {
        match update {
            Update::Published(p) => {
                let achieved: Vec<String> =
                    p.milestones_achieved.iter().map(|t| format_number(*t)).collect();
                tracing::info!(
                    value = %p.display_value,
                    size = p.size,
                    progress = %p.progress_percent,
                    milestones = ?achieved,
                    days_active = p.days_active,
                    projected_days = %p.projected_days,
                    "growth state"
                );
            }
            Update::Unavailable { label, reason } => {
                tracing::warn!(label = %label, reason = %reason, "data unavailable");
            }
        }
    }
}

/// Appends each update as one JSON line. Write errors are logged and dropped.
#[derive(Clone)]
pub struct JsonlRenderer {
    path: String,
}

impl JsonlRenderer {
    pub fn new(path: String) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Renderer for JsonlRenderer {
    async fn render(&self, update: &Update) {
        use tokio::io::AsyncWriteExt;

        let line = match serde_json::to_string(update) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "encode update failed");
                return;
            }
        };
        let res = async {
            let mut f = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            f.write_all(line.as_bytes()).await?;
            f.write_all(b"\n").await
        }
        .await;
        if let Err(e) = res {
            tracing::warn!(path = %self.path, error = %e, "append update failed");
        }
    }
}
