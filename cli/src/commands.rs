use std::sync::Arc;

use alerts::model::{normalize_token_id, validate_target};
use alerts::{AlertError, AlertRecord, AlertRegistry, AlertStore, Owner};
use market::{PriceSource, PriceSourceError, TradingPair};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error(transparent)]
    Alert(#[from] AlertError),

    #[error(transparent)]
    PriceSource(#[from] PriceSourceError),

    /// Removal of a token that has no alert.
    #[error("no alert found for token {0}")]
    NotFound(String),
}

/// What a successful registration produced: the stored alert plus the pair it
/// was captured from, for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSummary {
    pub record: AlertRecord,
    pub top_pair: TradingPair,
}

/// The three operations users drive the watcher with. Shares the registry
/// with the poller.
pub struct AlertCommands<S: AlertStore, P: PriceSource> {
    registry: Arc<AlertRegistry<S>>,
    source: Arc<P>,
}

impl<S: AlertStore, P: PriceSource> AlertCommands<S, P> {
    pub fn new(registry: Arc<AlertRegistry<S>>, source: Arc<P>) -> Self {
        Self { registry, source }
    }

    /// Watch `token_id` for the price coming back within the band around
    /// `target_price`. Re-adding a token replaces the previous alert.
    pub async fn add_alert(
        &self,
        token_id: &str,
        target_price: f64,
        requester: Owner,
    ) -> Result<AlertSummary, CommandError> {
        validate_target(target_price)?;
        let token_id = normalize_token_id(token_id);

        let pairs = self.source.fetch_pairs(&token_id).await.inspect_err(|e| {
            warn!(token_id = %token_id, error = %e, "could not fetch pairs for new alert");
        })?;
        let top_pair = pairs
            .into_iter()
            .next()
            .ok_or_else(|| PriceSourceError::NotFound(token_id.clone()))?;

        let record = self
            .registry
            .register(
                &token_id,
                target_price,
                top_pair.pair.base.clone(),
                top_pair.price_usd,
                requester,
            )
            .await?;

        info!(
            token_id = %record.token_id,
            pair = %top_pair.pair.id(),
            requested_by = %record.owner.display_name,
            "alert added"
        );

        Ok(AlertSummary { record, top_pair })
    }

    pub async fn list_alerts(&self) -> Vec<AlertRecord> {
        self.registry.list().await
    }

    pub async fn remove_alert(&self, token_id: &str) -> Result<(), CommandError> {
        if self.registry.remove(token_id).await? {
            Ok(())
        } else {
            Err(CommandError::NotFound(normalize_token_id(token_id)))
        }
    }
}
