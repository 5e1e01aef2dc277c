use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::AlertError;
use crate::model::{AlertRecord, Owner, TokenId, normalize_token_id};
use crate::store::AlertStore;

/// Identifies one registration of a token. A re-registration gets a new
/// revision, so work started against the old record can tell it is stale.
pub type Revision = u64;

/// A record as just observed, with the registration it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Observed {
    pub record: AlertRecord,
    pub revision: Revision,
}

struct Slot {
    record: AlertRecord,
    revision: Revision,
}

#[derive(Default)]
struct Alerts {
    slots: BTreeMap<TokenId, Slot>,
    next_revision: Revision,
}

impl Alerts {
    fn insert(&mut self, record: AlertRecord) -> Option<Slot> {
        let revision = self.next_revision;
        self.next_revision += 1;
        self.slots
            .insert(record.token_id.clone(), Slot { record, revision })
    }
}

/// Authoritative in-memory set of active alerts, persisted through a store.
///
/// A single lock guards the map and is held across the store write, so
/// mutations and saves are serialized: the snapshot on disk always matches the
/// map once a call returns, and an older snapshot can never overwrite a newer
/// one.
pub struct AlertRegistry<S: AlertStore> {
    alerts: Mutex<Alerts>,
    store: Arc<S>,
}

impl<S: AlertStore> AlertRegistry<S> {
    /// Build the registry from whatever the store holds.
    ///
    /// Fails with `CorruptState` if a snapshot exists but cannot be read, or
    /// holds the same token twice; the caller must not start polling in that
    /// case.
    pub async fn open(store: Arc<S>) -> Result<Self, AlertError> {
        let loaded = store
            .load()
            .await
            .map_err(|e| AlertError::CorruptState(format!("{e:#}")))?;

        let mut alerts = Alerts::default();
        for record in loaded {
            let token_id = record.token_id.clone();
            if alerts.insert(record).is_some() {
                return Err(AlertError::CorruptState(format!(
                    "token {token_id} appears more than once"
                )));
            }
        }

        info!(count = alerts.slots.len(), "alert registry restored");

        Ok(Self {
            alerts: Mutex::new(alerts),
            store,
        })
    }

    /// Insert or replace the alert for `token_id`. Any previous record,
    /// including its suppression state, is discarded.
    pub async fn register(
        &self,
        token_id: &str,
        target_price: f64,
        ticker: impl Into<String>,
        current_price: f64,
        owner: Owner,
    ) -> Result<AlertRecord, AlertError> {
        let record = AlertRecord::new(token_id, target_price, ticker, current_price, owner)?;

        let mut guard = self.alerts.lock().await;
        let previous = guard.insert(record.clone());

        if let Err(e) = self.persist(&guard).await {
            match previous {
                Some(prev) => guard.slots.insert(record.token_id.clone(), prev),
                None => guard.slots.remove(&record.token_id),
            };
            return Err(e);
        }

        info!(
            token_id = %record.token_id,
            ticker = %record.ticker,
            target_price = record.target_price,
            replaced = previous.is_some(),
            "alert registered"
        );

        Ok(record)
    }

    /// Delete the alert for `token_id`. Returns whether one existed.
    pub async fn remove(&self, token_id: &str) -> Result<bool, AlertError> {
        let key = normalize_token_id(token_id);

        let mut guard = self.alerts.lock().await;
        let Some(previous) = guard.slots.remove(&key) else {
            return Ok(false);
        };

        if let Err(e) = self.persist(&guard).await {
            guard.slots.insert(key, previous);
            return Err(e);
        }

        info!(token_id = %key, "alert removed");
        Ok(true)
    }

    /// Record the latest observed price and, if `fired_at` is given, the time
    /// a notification went out.
    ///
    /// Returns the updated record, or `None` if the alert was removed in the
    /// meantime (nothing is written in that case).
    pub async fn update_observation(
        &self,
        token_id: &str,
        current_price: f64,
        fired_at: Option<DateTime<Utc>>,
    ) -> Result<Option<AlertRecord>, AlertError> {
        Ok(self
            .apply(token_id, None, current_price, fired_at)
            .await?
            .map(|o| o.record))
    }

    /// Record the latest observed price and return the record together with
    /// its revision, for a later [`record_fire`](Self::record_fire).
    pub async fn observe(
        &self,
        token_id: &str,
        current_price: f64,
    ) -> Result<Option<Observed>, AlertError> {
        self.apply(token_id, None, current_price, None).await
    }

    /// Record a sent notification, but only if `token_id` still holds the
    /// registration `revision` refers to.
    ///
    /// Returns `None` without writing anything if the alert was removed or
    /// re-registered since it was observed.
    pub async fn record_fire(
        &self,
        token_id: &str,
        revision: Revision,
        current_price: f64,
        fired_at: DateTime<Utc>,
    ) -> Result<Option<AlertRecord>, AlertError> {
        Ok(self
            .apply(token_id, Some(revision), current_price, Some(fired_at))
            .await?
            .map(|o| o.record))
    }

    pub async fn get(&self, token_id: &str) -> Option<AlertRecord> {
        let guard = self.alerts.lock().await;
        guard
            .slots
            .get(&normalize_token_id(token_id))
            .map(|s| s.record.clone())
    }

    /// Point-in-time copy of every alert, ordered by token id.
    pub async fn list(&self) -> Vec<AlertRecord> {
        let guard = self.alerts.lock().await;
        guard.slots.values().map(|s| s.record.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.alerts.lock().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.alerts.lock().await.slots.is_empty()
    }

    async fn apply(
        &self,
        token_id: &str,
        expected_revision: Option<Revision>,
        current_price: f64,
        fired_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Observed>, AlertError> {
        let key = normalize_token_id(token_id);

        let mut guard = self.alerts.lock().await;
        let Some(slot) = guard.slots.get_mut(&key) else {
            return Ok(None);
        };
        if expected_revision.is_some_and(|r| r != slot.revision) {
            return Ok(None);
        }

        let previous = slot.record.clone();
        slot.record.last_known_price = current_price;
        if let Some(at) = fired_at {
            slot.record.mark_fired(at);
        }
        let observed = Observed {
            record: slot.record.clone(),
            revision: slot.revision,
        };

        if let Err(e) = self.persist(&guard).await {
            if let Some(slot) = guard.slots.get_mut(&key) {
                slot.record = previous;
            }
            return Err(e);
        }

        Ok(Some(observed))
    }

    async fn persist(&self, alerts: &Alerts) -> Result<(), AlertError> {
        let snapshot: Vec<AlertRecord> = alerts.slots.values().map(|s| s.record.clone()).collect();

        self.store.save(&snapshot).await.map_err(|e| {
            error!(error = %format!("{e:#}"), "alert snapshot write failed, rolling back");
            AlertError::PersistenceFailed(format!("{e:#}"))
        })
    }
}
