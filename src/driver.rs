use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::error::FetchError;
use crate::growth;
use crate::render::{RenderPayload, Renderer, Update};
use crate::source::ValuationSource;
use crate::stats::Stats;
use crate::types::{GrowthConfig, VisualState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Polling,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Published(VisualState),
    Unavailable(FetchError),
    /// Previous fetch still in flight; nothing fetched or published.
    Skipped,
}

/// Fetch -> map -> publish, once per tick.
pub struct Driver {
    cfg: GrowthConfig,
    source: Arc<dyn ValuationSource>,
    renderers: Vec<Arc<dyn Renderer>>,
    stats: Arc<Stats>,
    stats_log_sec: u64,
    polling: AtomicBool,
    in_flight: AtomicBool,
    latest: watch::Sender<Option<Update>>,
}

/// Clears the in-flight flag on drop, including when the tick task is
/// cancelled or panics.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

impl Driver {
    pub fn new(
        cfg: GrowthConfig,
        source: Arc<dyn ValuationSource>,
        renderers: Vec<Arc<dyn Renderer>>,
        stats: Arc<Stats>,
    ) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            cfg,
            source,
            renderers,
            stats,
            stats_log_sec: 0,
            polling: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            latest,
        }
    }

    pub fn with_stats_log(mut self, every_sec: u64) -> Self {
        self.stats_log_sec = every_sec;
        self
    }

    pub fn state(&self) -> DriverState {
        if self.polling.load(Ordering::Acquire) {
            DriverState::Polling
        } else {
            DriverState::Idle
        }
    }

    /// Last published update, shared with any number of readers.
    pub fn subscribe(&self) -> watch::Receiver<Option<Update>> {
        self.latest.subscribe()
    }

    pub async fn tick(&self) -> TickOutcome {
        self.stats.inc_tick();

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.stats.inc_skipped();
            tracing::debug!(
                asset_id = %self.cfg.asset_id,
                "previous refresh still in flight, skipping tick"
            );
            return TickOutcome::Skipped;
        }
        let _guard = InFlight(&self.in_flight);

        match self.fetch().await {
            Ok(valuation) => {
                let state = growth::map(valuation, &self.cfg, Utc::now());
                self.stats.record_published(valuation);
                self.publish(Update::Published(RenderPayload::from(&state))).await;
                TickOutcome::Published(state)
            }
            Err(e) => {
                self.stats.inc_unavailable();
                tracing::debug!(asset_id = %self.cfg.asset_id, error = %e, "valuation unavailable");
                self.publish(Update::unavailable(&e)).await;
                TickOutcome::Unavailable(e)
            }
        }
    }

    async fn fetch(&self) -> Result<f64, FetchError> {
        if self.cfg.is_unconfigured() {
            return Err(FetchError::Unconfigured);
        }

        let timeout = self.cfg.request_timeout;
        match tokio::time::timeout(timeout, self.source.fetch_valuation(&self.cfg.asset_id)).await {
            Ok(res) => res,
            Err(_) => Err(FetchError::Timeout(timeout.as_millis() as u64)),
        }
    }

    async fn publish(&self, update: Update) {
        for r in &self.renderers {
            r.render(&update).await;
        }
        self.latest.send_replace(Some(update));
    }

    /// Fires immediately, then every refresh interval, until the process
    /// exits. Each tick runs on its own task so a slow fetch never holds up
    /// the timer.
    pub async fn run(self: Arc<Self>) {
        self.polling.store(true, Ordering::Release);
        tracing::info!(
            asset_id = %self.cfg.asset_id,
            refresh_ms = self.cfg.refresh.as_millis() as u64,
            "polling started"
        );

        let mut interval = tokio::time::interval(self.cfg.refresh);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let d = self.clone();
            tokio::spawn(async move {
                d.tick().await;
            });

            let t = now_ms();
            if self.stats.should_log(t, self.stats_log_sec) {
                let ss = self.stats.snapshot(t);
                self.stats.mark_logged(t);
                tracing::info!(
                    up_sec = ss.up_sec,
                    ticks = ss.ticks,
                    published = ss.published,
                    unavailable = ss.unavailable,
                    skipped_overlap = ss.skipped_overlap,
                    last_valuation = ?ss.last_valuation,
                    "stats"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::dexscreener::testing::{local, serve_once};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct Fixed(Result<f64, FetchError>, AtomicUsize);

    impl Fixed {
        fn new(r: Result<f64, FetchError>) -> Arc<Self> {
            Arc::new(Self(r, AtomicUsize::new(0)))
        }
    }

    #[async_trait]
    impl ValuationSource for Fixed {
        async fn fetch_valuation(&self, _asset_id: &str) -> Result<f64, FetchError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0.clone()
        }
    }

    /// Blocks inside the fetch until released.
    #[derive(Default)]
    struct Gate {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ValuationSource for Gate {
        async fn fetch_valuation(&self, _asset_id: &str) -> Result<f64, FetchError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(2_000_000.0)
        }
    }

    struct Hang;

    #[async_trait]
    impl ValuationSource for Hang {
        async fn fetch_valuation(&self, _asset_id: &str) -> Result<f64, FetchError> {
            std::future::pending().await
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Update>>);

    #[async_trait]
    impl Renderer for Recorder {
        async fn render(&self, update: &Update) {
            self.0.lock().unwrap().push(update.clone());
        }
    }

    fn cfg() -> GrowthConfig {
        GrowthConfig {
            asset_id: "TokenAbc".to_string(),
            start: Utc::now(),
            ..GrowthConfig::default()
        }
    }

    fn driver(cfg: GrowthConfig, source: Arc<dyn ValuationSource>) -> (Driver, Arc<Recorder>) {
        let rec = Arc::new(Recorder::default());
        let r: Arc<dyn Renderer> = rec.clone();
        let d = Driver::new(cfg, source, vec![r], Stats::new(0));
        (d, rec)
    }

    #[tokio::test]
    async fn publishes_mapped_state_on_success() {
        let (d, rec) = driver(cfg(), Fixed::new(Ok(1_000_000.0)));
        let rx = d.subscribe();

        let state = match d.tick().await {
            TickOutcome::Published(s) => s,
            other => panic!("expected publish, got {:?}", other),
        };
        assert_eq!(state.size, 467);
        assert_eq!(state.achieved().collect::<Vec<_>>(), vec![100_000.0, 500_000.0, 1_000_000.0]);

        let got = rec.0.lock().unwrap().clone();
        assert_eq!(got.len(), 1);
        let Update::Published(p) = &got[0] else { panic!("expected publish") };
        assert_eq!(p.progress_percent, "10.0%");
        assert_eq!(rx.borrow().as_ref(), Some(&got[0]));
    }

    #[tokio::test]
    async fn dexscreener_fdv_flows_through_to_render_payload() {
        let host = serve_once("200 OK", r#"{"pairs":[{"fdv":1000000,"marketCap":800000}]}"#).await;
        let c = GrowthConfig { target: 10_000_000.0, ..cfg() };
        let (d, rec) = driver(c, Arc::new(local(host)));

        let state = match d.tick().await {
            TickOutcome::Published(s) => s,
            other => panic!("expected publish, got {:?}", other),
        };
        assert_eq!(state.valuation, 1_000_000.0);

        let got = rec.0.lock().unwrap().clone();
        let Update::Published(p) = &got[0] else { panic!("expected publish") };
        assert_eq!(p.size, 467);
        assert_eq!(p.progress_percent, "10.0%");
        assert_eq!(p.display_value, "$1.00M");
        assert!(p.milestones.iter().all(|m| m.achieved == (m.threshold <= 1_000_000.0)));
        assert_eq!(p.milestones_achieved, vec![100_000.0, 500_000.0, 1_000_000.0]);
    }

    #[tokio::test]
    async fn dexscreener_empty_pairs_publishes_unavailable() {
        let host = serve_once("200 OK", r#"{"pairs":[]}"#).await;
        let (d, rec) = driver(cfg(), Arc::new(local(host)));

        assert!(matches!(d.tick().await, TickOutcome::Unavailable(FetchError::Malformed(_))));
        assert!(matches!(
            &rec.0.lock().unwrap()[0],
            Update::Unavailable { label, .. } if label == "Error loading"
        ));
    }

    #[tokio::test]
    async fn failure_publishes_error_signal_and_next_tick_still_runs() {
        let src = Fixed::new(Err(FetchError::Malformed("no pairs".into())));
        let (d, rec) = driver(cfg(), src.clone());

        assert!(matches!(d.tick().await, TickOutcome::Unavailable(FetchError::Malformed(_))));
        assert!(matches!(d.tick().await, TickOutcome::Unavailable(_)));
        assert_eq!(src.1.load(Ordering::SeqCst), 2);

        let got = rec.0.lock().unwrap().clone();
        assert!(got
            .iter()
            .all(|u| matches!(u, Update::Unavailable { label, .. } if label == "Error loading")));
    }

    #[tokio::test]
    async fn placeholder_asset_never_hits_the_network() {
        let src = Fixed::new(Ok(1.0));
        let placeholder = GrowthConfig { start: Utc::now(), ..GrowthConfig::default() };
        let (d, rec) = driver(placeholder, src.clone());

        assert_eq!(d.tick().await, TickOutcome::Unavailable(FetchError::Unconfigured));
        assert_eq!(src.1.load(Ordering::SeqCst), 0);
        assert!(matches!(
            &rec.0.lock().unwrap()[0],
            Update::Unavailable { label, .. } if label == "Not configured"
        ));
    }

    #[tokio::test]
    async fn hung_fetch_times_out() {
        let c = GrowthConfig { request_timeout: Duration::from_millis(50), ..cfg() };
        let (d, _rec) = driver(c, Arc::new(Hang));
        assert_eq!(d.tick().await, TickOutcome::Unavailable(FetchError::Timeout(50)));

        // guard released after timeout
        let again = d.tick().await;
        assert_eq!(again, TickOutcome::Unavailable(FetchError::Timeout(50)));
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let gate = Arc::new(Gate::default());
        let (d, rec) = driver(cfg(), gate.clone());
        let d = Arc::new(d);

        let first = {
            let d = d.clone();
            tokio::spawn(async move { d.tick().await })
        };
        gate.entered.notified().await;

        assert_eq!(d.tick().await, TickOutcome::Skipped);
        assert!(rec.0.lock().unwrap().is_empty());

        gate.release.notify_one();
        assert!(matches!(first.await.unwrap(), TickOutcome::Published(_)));
        assert_eq!(rec.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn run_polls_immediately_and_marks_state() {
        let src = Fixed::new(Ok(50_000.0));
        let (d, _rec) = driver(cfg(), src.clone());
        let d = Arc::new(d);
        assert_eq!(d.state(), DriverState::Idle);

        let mut rx = d.subscribe();
        let handle = tokio::spawn(d.clone().run());

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(d.state(), DriverState::Polling);
        assert!(matches!(rx.borrow().as_ref(), Some(Update::Published(_))));
        assert!(src.1.load(Ordering::SeqCst) >= 1);
        handle.abort();
    }
}
