//! Geolocation source - the device location API behind an async trait
//!
//! `FixFeed` is the concrete source used by the bridge binary: readings are
//! pushed in from outside (stdin, a GPS reader) and one-shot requests resolve
//! against them.

use crate::domain::error::GeolocationError;
use crate::domain::types::GeoPoint;
use crate::infra::config::Config;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Options for a one-shot position request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeolocationOptions {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    /// 0 means never reuse a cached fix
    pub max_cache_age_ms: u64,
}

impl Default for GeolocationOptions {
    fn default() -> Self {
        Self { high_accuracy: true, timeout_ms: 10_000, max_cache_age_ms: 0 }
    }
}

impl GeolocationOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            high_accuracy: config.geolocation_high_accuracy(),
            timeout_ms: config.geolocation_timeout_ms(),
            max_cache_age_ms: config.geolocation_max_cache_age_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// One-shot device location query
#[async_trait]
pub trait GeolocationSource: Send + Sync {
    async fn current_position(
        &self,
        options: &GeolocationOptions,
    ) -> Result<GeoPoint, GeolocationError>;
}

/// A reading pushed into a `FixFeed`
#[derive(Debug, Clone, PartialEq)]
pub enum FixReading {
    Fix(GeoPoint),
    Error(GeolocationError),
}

#[derive(Debug, Clone)]
struct StampedReading {
    reading: FixReading,
    at: Instant,
}

/// Latest-value position feed
///
/// A request with `max_cache_age_ms == 0` waits for the next reading pushed
/// after the request started; otherwise a cached fix younger than the age
/// limit is returned immediately.
#[derive(Debug)]
pub struct FixFeed {
    tx: watch::Sender<Option<StampedReading>>,
}

impl Default for FixFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl FixFeed {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Publish a new reading to all pending and future requests
    pub fn push(&self, reading: FixReading) {
        self.tx.send_replace(Some(StampedReading { reading, at: Instant::now() }));
    }

    fn cached_fix(&self, max_age: Duration) -> Option<GeoPoint> {
        match &*self.tx.borrow() {
            Some(StampedReading { reading: FixReading::Fix(p), at }) if at.elapsed() <= max_age => {
                Some(*p)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl GeolocationSource for FixFeed {
    async fn current_position(
        &self,
        options: &GeolocationOptions,
    ) -> Result<GeoPoint, GeolocationError> {
        if options.max_cache_age_ms > 0 {
            if let Some(p) = self.cached_fix(Duration::from_millis(options.max_cache_age_ms)) {
                return Ok(p);
            }
        }

        // subscribe() marks the current value as seen, so only newer readings count
        let mut rx = self.tx.subscribe();

        let wait = async {
            loop {
                if rx.changed().await.is_err() {
                    return Err(GeolocationError::Unavailable("fix feed closed".to_string()));
                }
                let reading = rx.borrow_and_update().clone();
                match reading {
                    Some(StampedReading { reading: FixReading::Fix(p), .. }) => return Ok(p),
                    Some(StampedReading { reading: FixReading::Error(e), .. }) => return Err(e),
                    None => continue,
                }
            }
        };

        match tokio::time::timeout(options.timeout(), wait).await {
            Ok(result) => result,
            Err(_) => Err(GeolocationError::Timeout(options.timeout_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fresh_only(timeout_ms: u64) -> GeolocationOptions {
        GeolocationOptions { high_accuracy: true, timeout_ms, max_cache_age_ms: 0 }
    }

    #[test]
    fn test_default_options() {
        let options = GeolocationOptions::default();
        assert!(options.high_accuracy);
        assert_eq!(options.timeout_ms, 10_000);
        assert_eq!(options.max_cache_age_ms, 0);
        assert_eq!(GeolocationOptions::from_config(&Config::default()), options);
    }

    #[tokio::test]
    async fn test_waits_for_fresh_fix() {
        let feed = Arc::new(FixFeed::new());
        feed.push(FixReading::Fix(GeoPoint::new(1.0, 1.0)));

        let pending = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.current_position(&fresh_only(1000)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        feed.push(FixReading::Fix(GeoPoint::new(2.0, 2.0)));

        let result = pending.await.unwrap();
        assert_eq!(result, Ok(GeoPoint::new(2.0, 2.0)));
    }

    #[tokio::test]
    async fn test_cached_fix_reused_within_age() {
        let feed = FixFeed::new();
        feed.push(FixReading::Fix(GeoPoint::new(1.0, 1.0)));
        let options = GeolocationOptions { max_cache_age_ms: 60_000, ..fresh_only(10) };
        assert_eq!(feed.current_position(&options).await, Ok(GeoPoint::new(1.0, 1.0)));
    }

    #[tokio::test]
    async fn test_timeout_without_fix() {
        let feed = FixFeed::new();
        let result = feed.current_position(&fresh_only(30)).await;
        assert_eq!(result, Err(GeolocationError::Timeout(30)));
    }

    #[tokio::test]
    async fn test_pushed_error_is_returned() {
        let feed = Arc::new(FixFeed::new());
        let pending = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.current_position(&fresh_only(1000)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        feed.push(FixReading::Error(GeolocationError::PermissionDenied));

        assert_eq!(pending.await.unwrap(), Err(GeolocationError::PermissionDenied));
    }
}
