use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct Stats {
    start_ms: AtomicU64,
    last_log_ms: AtomicU64,

    ticks: AtomicU64,
    published: AtomicU64,
    unavailable: AtomicU64,
    skipped_overlap: AtomicU64,

    // f64 bits
    last_valuation: AtomicU64,
}

impl Stats {
    pub fn new(now_ms: u64) -> Arc<Self> {
        let s = Arc::new(Self::default());
        s.start_ms.store(now_ms, Ordering::Relaxed);
        s.last_log_ms.store(now_ms, Ordering::Relaxed);
        s
    }

    pub fn inc_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self, valuation: f64) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.last_valuation.store(valuation.to_bits(), Ordering::Relaxed);
    }

    pub fn inc_unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.skipped_overlap.fetch_add(1, Ordering::Relaxed);
    }

    pub fn should_log(&self, now_ms: u64, every_sec: u64) -> bool {
        if every_sec == 0 { return false; }
        let last = self.last_log_ms.load(Ordering::Relaxed);
        now_ms.saturating_sub(last) >= every_sec.saturating_mul(1000)
    }

    pub fn mark_logged(&self, now_ms: u64) {
        self.last_log_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self, now_ms: u64) -> StatsSnapshot {
        let start = self.start_ms.load(Ordering::Relaxed);
        let published = self.published.load(Ordering::Relaxed);
        StatsSnapshot {
            now_ms,
            up_sec: now_ms.saturating_sub(start) / 1000,
            ticks: self.ticks.load(Ordering::Relaxed),
            published,
            unavailable: self.unavailable.load(Ordering::Relaxed),
            skipped_overlap: self.skipped_overlap.load(Ordering::Relaxed),
            last_valuation: (published > 0)
                .then(|| f64::from_bits(self.last_valuation.load(Ordering::Relaxed))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub now_ms: u64,
    pub up_sec: u64,
    pub ticks: u64,
    pub published: u64,
    pub unavailable: u64,
    pub skipped_overlap: u64,
    pub last_valuation: Option<f64>,
}
