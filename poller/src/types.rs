//! Shared types used by the poller.

use std::sync::Arc;
use std::time::Duration;

use alerts::AlertRegistry;

/// How often every alert is re-evaluated.
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Minimum time between two notifications for the same token.
pub const SUPPRESSION_WINDOW_HOURS: i64 = 24;

/// Half-width of the alert band, as a fraction of the target.
pub const BAND_TOLERANCE: f64 = 0.10;

/// Upper bound on a single price fetch. Kept below the poll interval so one
/// slow upstream call cannot hold up the next tick.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Configuration knobs for the poller.
///
/// Production uses [`PollerConfig::default`]; the fields exist so tests can
/// shrink the timings.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_every: Duration,
    pub suppression_window: chrono::Duration,
    pub band_tolerance: f64,
    pub fetch_timeout: Duration,
    /// Maximum number of price fetches in flight within one tick.
    pub max_concurrent_fetches: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_every: POLL_INTERVAL,
            suppression_window: chrono::Duration::hours(SUPPRESSION_WINDOW_HOURS),
            band_tolerance: BAND_TOLERANCE,
            fetch_timeout: FETCH_TIMEOUT,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}

/// What happened to one alert during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Upstream failed or timed out; retried next tick.
    FetchFailed,
    /// Removed by a command while the tick was running.
    Vanished,
    OutOfBand,
    Suppressed,
    Fired,
    /// Notifier failed; the alert stays eligible.
    DeliveryFailed,
    PersistenceFailed,
}

/// Per-tick tally, mostly for logs and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub checked: usize,
    pub fetch_failed: usize,
    pub vanished: usize,
    pub out_of_band: usize,
    pub suppressed: usize,
    pub fired: usize,
    pub delivery_failed: usize,
    pub persistence_failed: usize,
}

impl TickReport {
    pub fn record(&mut self, outcome: RecordOutcome) {
        self.checked += 1;
        match outcome {
            RecordOutcome::FetchFailed => self.fetch_failed += 1,
            RecordOutcome::Vanished => self.vanished += 1,
            RecordOutcome::OutOfBand => self.out_of_band += 1,
            RecordOutcome::Suppressed => self.suppressed += 1,
            RecordOutcome::Fired => self.fired += 1,
            RecordOutcome::DeliveryFailed => self.delivery_failed += 1,
            RecordOutcome::PersistenceFailed => self.persistence_failed += 1,
        }
    }
}

/// Registry handle shared between the poller and command handlers.
pub type SharedRegistry<S> = Arc<AlertRegistry<S>>;
