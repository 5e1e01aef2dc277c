use chrono::{DateTime, SubsecRound, Utc};

use crate::error::AlertError;

/// Lower-cased token contract address.
pub type TokenId = String;

/// Who asked for the alert. Opaque to the core; carried into notifications.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Owner {
    pub display_name: String,
    pub avatar_ref: String,
}

impl Owner {
    pub fn new(display_name: impl Into<String>, avatar_ref: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            avatar_ref: avatar_ref.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub token_id: TokenId,

    // Config
    pub target_price: f64,
    pub ticker: String,
    pub owner: Owner,

    // Progress
    pub last_known_price: f64,
    pub last_alert_at: Option<DateTime<Utc>>,
}

impl AlertRecord {
    pub fn new(
        token_id: &str,
        target_price: f64,
        ticker: impl Into<String>,
        current_price: f64,
        owner: Owner,
    ) -> Result<Self, AlertError> {
        validate_target(target_price)?;

        Ok(Self {
            token_id: normalize_token_id(token_id),
            target_price,
            ticker: ticker.into(),
            owner,
            last_known_price: current_price,
            last_alert_at: None,
        })
    }

    /// Record a notification at `at`. Never moves the timestamp backwards.
    pub fn mark_fired(&mut self, at: DateTime<Utc>) {
        let at = stored_precision(at);
        self.last_alert_at = Some(match self.last_alert_at {
            Some(prev) if prev > at => prev,
            _ => at,
        });
    }
}

pub fn normalize_token_id(raw: &str) -> TokenId {
    raw.trim().to_lowercase()
}

pub fn validate_target(target_price: f64) -> Result<(), AlertError> {
    if target_price.is_finite() && target_price > 0.0 {
        Ok(())
    } else {
        Err(AlertError::InvalidTarget(target_price))
    }
}

/// Timestamps are kept at the precision the snapshot file stores (µs) so a
/// record in memory always equals the one read back from disk.
pub fn stored_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}
