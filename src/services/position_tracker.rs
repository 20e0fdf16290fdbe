//! Position tracker - one-shot fixes and fixed-interval polling
//!
//! Each polling tick fires an independent one-shot request (fire-and-forget).
//! All in-flight requests live in a `JoinSet` owned by the polling task, so
//! aborting the task cancels them too and no callback fires after
//! `stop_polling()` returns.

use crate::domain::error::{GeolocationError, NavError};
use crate::domain::types::GeoPoint;
use crate::infra::metrics::Metrics;
use crate::io::geolocation::{GeolocationOptions, GeolocationSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Log a failed fix (cold path)
#[cold]
fn log_position_unavailable(e: &NavError) {
    warn!(error = %e, "position_unavailable");
}

pub struct PositionTracker {
    source: Arc<dyn GeolocationSource>,
    options: GeolocationOptions,
    metrics: Arc<Metrics>,
    /// Active polling loop, at most one
    polling: Option<JoinHandle<()>>,
}

impl PositionTracker {
    pub fn new(
        source: Arc<dyn GeolocationSource>,
        options: GeolocationOptions,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { source, options, metrics, polling: None }
    }

    /// Request a single fresh fix
    pub async fn get_once(&self) -> Result<GeoPoint, NavError> {
        fetch_once(self.source.as_ref(), &self.options, &self.metrics).await
    }

    /// A detached one-shot request, for callers that must not hold the tracker
    pub fn fetch_detached(&self) -> impl std::future::Future<Output = Result<GeoPoint, NavError>> {
        let source = self.source.clone();
        let options = self.options;
        let metrics = self.metrics.clone();
        async move { fetch_once(source.as_ref(), &options, &metrics).await }
    }

    /// Poll every `every`, starting immediately; replaces any running loop
    pub fn start_polling<F>(&mut self, every: Duration, on_update: F)
    where
        F: Fn(GeoPoint) + Send + Sync + 'static,
    {
        self.stop_polling();

        let source = self.source.clone();
        let options = self.options;
        let metrics = self.metrics.clone();
        let on_update = Arc::new(on_update);

        let task = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut in_flight = JoinSet::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let source = source.clone();
                        let metrics = metrics.clone();
                        let on_update = on_update.clone();
                        in_flight.spawn(async move {
                            if let Ok(p) = fetch_once(source.as_ref(), &options, &metrics).await {
                                on_update(p);
                            }
                        });
                    }
                    // Reap finished requests so the set does not grow
                    Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                }
            }
        });

        info!(interval_ms = %every.as_millis(), "position_polling_started");
        self.polling = Some(task);
    }

    /// Stop the polling loop; a no-op when not polling
    pub fn stop_polling(&mut self) {
        if let Some(task) = self.polling.take() {
            task.abort();
            info!("position_polling_stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.polling.is_some()
    }
}

impl Drop for PositionTracker {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

async fn fetch_once(
    source: &dyn GeolocationSource,
    options: &GeolocationOptions,
    metrics: &Metrics,
) -> Result<GeoPoint, NavError> {
    // Guard against sources that ignore the timeout option
    let result = match tokio::time::timeout(options.timeout(), source.current_position(options)).await
    {
        Ok(result) => result,
        Err(_) => Err(GeolocationError::Timeout(options.timeout_ms)),
    };

    match result {
        Ok(p) => {
            metrics.record_position_fix();
            debug!(lat = %p.lat, lng = %p.lng, "position_fix");
            Ok(p)
        }
        Err(e) => {
            metrics.record_position_failure();
            let e = NavError::PositionUnavailable(e);
            log_position_unavailable(&e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::mpsc;

    /// Returns an incrementing latitude per call
    struct CountingSource {
        calls: AtomicU64,
    }

    #[async_trait]
    impl GeolocationSource for CountingSource {
        async fn current_position(
            &self,
            _options: &GeolocationOptions,
        ) -> Result<GeoPoint, GeolocationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GeoPoint::new(n as f64, 0.0))
        }
    }

    /// Never answers
    struct SilentSource;

    #[async_trait]
    impl GeolocationSource for SilentSource {
        async fn current_position(
            &self,
            _options: &GeolocationOptions,
        ) -> Result<GeoPoint, GeolocationError> {
            std::future::pending().await
        }
    }

    fn tracker_with(source: Arc<dyn GeolocationSource>, timeout_ms: u64) -> PositionTracker {
        let options = GeolocationOptions { timeout_ms, ..GeolocationOptions::default() };
        PositionTracker::new(source, options, Arc::new(Metrics::new()))
    }

    #[tokio::test]
    async fn test_get_once() {
        let tracker = tracker_with(Arc::new(CountingSource { calls: AtomicU64::new(0) }), 1000);
        assert_eq!(tracker.get_once().await, Ok(GeoPoint::new(0.0, 0.0)));
    }

    #[tokio::test]
    async fn test_get_once_times_out() {
        let tracker = tracker_with(Arc::new(SilentSource), 20);
        assert_eq!(
            tracker.get_once().await,
            Err(NavError::PositionUnavailable(GeolocationError::Timeout(20)))
        );
        assert_eq!(tracker.metrics.position_failures(), 1);
    }

    #[tokio::test]
    async fn test_polling_fires_immediately_then_repeats() {
        let mut tracker =
            tracker_with(Arc::new(CountingSource { calls: AtomicU64::new(0) }), 1000);
        let (tx, mut rx) = mpsc::unbounded_channel();
        tracker.start_polling(Duration::from_millis(10), move |p| {
            let _ = tx.send(p);
        });

        let first = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await.unwrap();
        assert!(first.is_some());
        let second = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await.unwrap();
        assert!(second.is_some());
        tracker.stop_polling();
    }

    #[tokio::test]
    async fn test_stop_polling_idempotent() {
        let mut tracker =
            tracker_with(Arc::new(CountingSource { calls: AtomicU64::new(0) }), 1000);
        tracker.stop_polling();
        assert!(!tracker.is_polling());

        tracker.start_polling(Duration::from_millis(10), |_| {});
        assert!(tracker.is_polling());
        tracker.stop_polling();
        tracker.stop_polling();
        assert!(!tracker.is_polling());
    }

    #[tokio::test]
    async fn test_no_updates_after_stop() {
        let mut tracker =
            tracker_with(Arc::new(CountingSource { calls: AtomicU64::new(0) }), 1000);
        let (tx, mut rx) = mpsc::unbounded_channel();
        tracker.start_polling(Duration::from_millis(5), move |p| {
            let _ = tx.send(p);
        });
        tokio::time::timeout(Duration::from_millis(500), rx.recv()).await.unwrap();
        tracker.stop_polling();

        // Drain whatever was delivered before the abort landed
        tokio::time::sleep(Duration::from_millis(20)).await;
        while rx.try_recv().is_ok() {}

        tokio::time::sleep(Duration::from_millis(50)).await;
        // Aborted task dropped the callback, closing the channel
        assert_eq!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected));
    }

    #[tokio::test]
    async fn test_restart_replaces_previous_loop() {
        let mut tracker =
            tracker_with(Arc::new(CountingSource { calls: AtomicU64::new(0) }), 1000);
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        tracker.start_polling(Duration::from_millis(5), move |p| {
            let _ = tx_a.send(p);
        });
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        tracker.start_polling(Duration::from_millis(5), move |p| {
            let _ = tx_b.send(p);
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        while rx_a.try_recv().is_ok() {}
        assert_eq!(rx_a.try_recv(), Err(mpsc::error::TryRecvError::Disconnected));
        assert!(rx_b.recv().await.is_some());
        tracker.stop_polling();
    }
}
