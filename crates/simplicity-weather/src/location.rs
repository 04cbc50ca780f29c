//! Position acquisition with a timeout and a maximum cached-fix age.

use crate::types::{LocationError, LocationFix};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Anything that can resolve the current position.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn current_position(&self) -> Result<LocationFix, LocationError>;
}

/// A position that never moves, typically taken from config.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub LocationFix);

#[async_trait]
impl LocationSource for FixedLocation {
    async fn current_position(&self) -> Result<LocationFix, LocationError> {
        Ok(self.0)
    }
}

/// Options for a single position request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationOptions {
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl LocationOptions {
    pub fn from_millis(timeout_ms: u64, maximum_age_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            maximum_age: Duration::from_millis(maximum_age_ms),
        }
    }
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self::from_millis(15_000, 60_000)
    }
}

/// Wraps a [`LocationSource`] with [`LocationOptions`].
///
/// A fix younger than `maximum_age` is handed out again without touching the
/// source. Otherwise the source gets `timeout` to answer.
pub struct LocationService {
    source: Arc<dyn LocationSource>,
    options: LocationOptions,
    last_fix: Mutex<Option<(LocationFix, Instant)>>,
}

impl LocationService {
    pub fn new(source: Arc<dyn LocationSource>, options: LocationOptions) -> Self {
        Self {
            source,
            options,
            last_fix: Mutex::new(None),
        }
    }

    fn cached_fix(&self) -> Option<LocationFix> {
        let guard = self.last_fix.lock();
        guard
            .as_ref()
            .filter(|(_, at)| at.elapsed() < self.options.maximum_age)
            .map(|(fix, _)| *fix)
    }

    pub async fn get_current_position(&self) -> Result<LocationFix, LocationError> {
        if let Some(fix) = self.cached_fix() {
            tracing::debug!("Reusing cached fix {}, {}", fix.latitude, fix.longitude);
            return Ok(fix);
        }

        let fix = tokio::time::timeout(self.options.timeout, self.source.current_position())
            .await
            .map_err(|_| LocationError::Timeout)??;

        *self.last_fix.lock() = Some((fix, Instant::now()));
        Ok(fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        delay: Duration,
        result: Result<LocationFix, LocationError>,
    }

    impl CountingSource {
        fn new(delay: Duration, result: Result<LocationFix, LocationError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                result,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LocationSource for CountingSource {
        async fn current_position(&self) -> Result<LocationFix, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        }
    }

    fn sf() -> LocationFix {
        LocationFix::new(37.77, -122.42)
    }

    #[test]
    fn test_default_options() {
        let options = LocationOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(15));
        assert_eq!(options.maximum_age, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_fixed_location() {
        let service = LocationService::new(
            Arc::new(FixedLocation(sf())),
            LocationOptions::default(),
        );
        assert_eq!(service.get_current_position().await.unwrap(), sf());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let source = CountingSource::new(Duration::from_secs(20), Ok(sf()));
        let service = LocationService::new(source.clone(), LocationOptions::default());

        let err = service.get_current_position().await.unwrap_err();
        assert_eq!(err, LocationError::Timeout);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recent_fix_is_reused() {
        let source = CountingSource::new(Duration::from_millis(10), Ok(sf()));
        let service = LocationService::new(source.clone(), LocationOptions::default());

        service.get_current_position().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let fix = service.get_current_position().await.unwrap();

        assert_eq!(fix, sf());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fix_is_refreshed() {
        let source = CountingSource::new(Duration::from_millis(10), Ok(sf()));
        let service = LocationService::new(source.clone(), LocationOptions::default());

        service.get_current_position().await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        service.get_current_position().await.unwrap();

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_maximum_age_never_reuses() {
        let source = CountingSource::new(Duration::ZERO, Ok(sf()));
        let service =
            LocationService::new(source.clone(), LocationOptions::from_millis(15_000, 0));

        service.get_current_position().await.unwrap();
        service.get_current_position().await.unwrap();

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let source = CountingSource::new(
            Duration::ZERO,
            Err(LocationError::PositionUnavailable("Position unavailable".into())),
        );
        let service = LocationService::new(source.clone(), LocationOptions::default());

        assert!(service.get_current_position().await.is_err());
        assert!(service.get_current_position().await.is_err());
        assert_eq!(source.calls(), 2);
    }
}
