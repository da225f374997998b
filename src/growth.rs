//! Valuation -> visual state. Everything here is pure; the only clock is the
//! `now` argument.

use chrono::{DateTime, Utc};

use crate::types::{GrowthConfig, Milestone, ProjectedDays, VisualState};

const DAY_MS: i64 = 86_400_000;

/// Projections past this many days are reported as unbounded.
pub const MAX_PROJECTED_DAYS: u64 = 1000;

/// Log-scaled size in pixels. Small valuations still move the visual, and the
/// curve saturates exactly at the target.
pub fn size_for(valuation: f64, cfg: &GrowthConfig) -> u32 {
    if valuation.is_nan() || valuation <= 0.0 {
        return cfg.min_size;
    }
    if valuation >= cfg.target {
        return cfg.max_size;
    }

    let log_low = cfg.log_floor.log10();
    let log_high = cfg.target.log10();
    let progress = ((valuation.log10() - log_low) / (log_high - log_low)).clamp(0.0, 1.0);

    let min = f64::from(cfg.min_size);
    let max = f64::from(cfg.max_size);
    (min + (max - min) * progress).round() as u32
}

/// Percent of target reached, capped at 100.
pub fn progress_percent(valuation: f64, target: f64) -> f64 {
    if valuation.is_nan() || valuation <= 0.0 {
        return 0.0;
    }
    (valuation / target * 100.0).min(100.0)
}

pub fn format_percent(progress: f64) -> String {
    format!("{:.1}%", progress)
}

/// Every threshold is achieved iff `valuation >= threshold`. No hysteresis.
pub fn milestones(valuation: f64, thresholds: &[f64]) -> Vec<Milestone> {
    thresholds
        .iter()
        .map(|&threshold| Milestone {
            threshold,
            achieved: valuation >= threshold,
        })
        .collect()
}

/// Whole days between `start` and `now`, rounded up, never below 1.
pub fn elapsed_days(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let ms = (now - start).num_milliseconds().unsigned_abs();
    let days = ms.div_ceil(DAY_MS as u64);
    days.max(1)
}

/// Linear extrapolation of the average daily gain since the start.
pub fn projected_days(valuation: f64, target: f64, days_active: u64) -> ProjectedDays {
    if !valuation.is_finite() || valuation <= 0.0 {
        return ProjectedDays::Unbounded;
    }
    if valuation >= target {
        return ProjectedDays::Days(0);
    }

    let daily_rate = valuation / days_active.max(1) as f64;
    let days = ((target - valuation) / daily_rate).ceil();
    if days > MAX_PROJECTED_DAYS as f64 {
        ProjectedDays::Unbounded
    } else {
        ProjectedDays::Days(days as u64)
    }
}

pub fn map(valuation: f64, cfg: &GrowthConfig, now: DateTime<Utc>) -> VisualState {
    let days_active = elapsed_days(cfg.start, now);
    VisualState {
        valuation,
        size: size_for(valuation, cfg),
        progress: progress_percent(valuation, cfg.target),
        milestones: milestones(valuation, &cfg.milestones),
        days_active,
        projected_days: projected_days(valuation, cfg.target, days_active),
    }
}
