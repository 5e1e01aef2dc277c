//! Decides whether an alert should fire for an observed price. Pure
//! functions only; no async, no IO.

use alerts::AlertRecord;
use chrono::{DateTime, Utc};

use super::types::PollerConfig;

/// Result of evaluating one alert against one price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Fire,
    OutOfBand,
    /// In band, but the last notification is too recent.
    Suppressed,
}

/// Inclusive price range around a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBand {
    pub lower: f64,
    pub upper: f64,
}

impl PriceBand {
    pub fn around(target: f64, tolerance: f64) -> Self {
        Self {
            lower: target * (1.0 - tolerance),
            upper: target * (1.0 + tolerance),
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        self.lower <= price && price <= self.upper
    }
}

/// Signed distance of `price` from `target`, in percent of the target.
pub fn deviation_pct(price: f64, target: f64) -> f64 {
    (price - target) / target * 100.0
}

/// True if no alert was sent yet or the last one is at least `window` old.
///
/// Only wall-clock time counts: leaving and re-entering the band does not
/// reset the window.
pub fn suppression_elapsed(
    last_alert_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> bool {
    match last_alert_at {
        None => true,
        Some(last) => now - last >= window,
    }
}

/// Check whether `record` may fire at `now` given the observed `price`.
pub fn evaluate(
    record: &AlertRecord,
    price: f64,
    cfg: &PollerConfig,
    now: DateTime<Utc>,
) -> Evaluation {
    let band = PriceBand::around(record.target_price, cfg.band_tolerance);
    if !band.contains(price) {
        return Evaluation::OutOfBand;
    }

    if !suppression_elapsed(record.last_alert_at, now, cfg.suppression_window) {
        return Evaluation::Suppressed;
    }

    Evaluation::Fire
}
