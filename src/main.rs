mod config;
mod driver;
mod error;
mod growth;
mod render;
mod share;
mod source;
mod stats;
mod types;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::driver::Driver;
use crate::render::{JsonlRenderer, LogRenderer, Renderer};
use crate::source::DexScreenerSource;
use crate::stats::Stats;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let s = Settings::from_env()?;
    let now = Utc::now();
    let cfg = s.growth_config(now)?;

    if cfg.is_unconfigured() {
        tracing::error!("ASSET_ID is not set; every refresh will report \"Not configured\"");
    } else {
        let text = share::share_text(&cfg.asset_id, cfg.target, s.community_url.as_deref());
        tracing::info!(
            asset = %share::short_address(&cfg.asset_id),
            chart = %share::chart_url(&s.chain, &cfg.asset_id),
            share = %share::tweet_intent_url(&text)?,
            community = s.community_url.as_deref().unwrap_or(""),
            "tracking token"
        );
    }
    tracing::info!(
        target_mc = cfg.target,
        refresh_ms = cfg.refresh.as_millis() as u64,
        start = %cfg.start,
        milestones = cfg.milestones.len(),
        "growth config loaded"
    );

    let source = Arc::new(DexScreenerSource::new(s.api_host.clone())?);

    let mut renderers: Vec<Arc<dyn Renderer>> = vec![Arc::new(LogRenderer)];
    if let Some(p) = s
        .state_jsonl_path
        .as_ref()
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
    {
        renderers.push(Arc::new(JsonlRenderer::new(p)));
    }

    let stats = Stats::new(now.timestamp_millis() as u64);
    let driver =
        Arc::new(Driver::new(cfg, source, renderers, stats).with_stats_log(s.stats_log_sec));

    tracing::debug!(state = ?driver.state(), "starting driver");
    driver.run().await;
    Ok(())
}
