use alerts::{AlertRecord, Owner};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::band::deviation_pct;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("alert delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Everything a sink needs to tell people an alert fired. Rendering is up to
/// the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub token_id: String,
    pub message: String,
    pub ticker: String,
    pub price: f64,
    pub target_price: f64,
    pub deviation_pct: f64,
    pub owner: Owner,
    pub fired_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(record: &AlertRecord, price: f64, fired_at: DateTime<Utc>) -> Self {
        Self {
            token_id: record.token_id.clone(),
            message: format!("{} is near the VWAP!", record.ticker),
            ticker: record.ticker.clone(),
            price,
            target_price: record.target_price,
            deviation_pct: deviation_pct(price, record.target_price),
            owner: record.owner.clone(),
            fired_at,
        }
    }
}

/// Delivery channel for fired alerts.
///
/// An `Err` means nobody was told; the poller will not mark the alert as
/// fired and tries again on the next eligible tick.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError>;
}

/// Writes alerts to the log. Used when no chat channel is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        info!(
            token_id = %event.token_id,
            ticker = %event.ticker,
            price = event.price,
            deviation_pct = format_args!("{:+.2}", event.deviation_pct),
            owner = %event.owner.display_name,
            "{}",
            event.message
        );
        Ok(())
    }
}
