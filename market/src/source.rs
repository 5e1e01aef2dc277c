use async_trait::async_trait;

use crate::error::PriceSourceError;
use crate::types::TradingPair;

/// Narrow seam between the alert core and whatever serves market data.
#[async_trait]
pub trait PriceSource: Send + Sync + 'static {
    /// Ranked pairs for `token_id`, best (deepest liquidity) first.
    ///
    /// Never returns an empty vector: "nothing tradable" is `NotFound`.
    async fn fetch_pairs(&self, token_id: &str) -> Result<Vec<TradingPair>, PriceSourceError>;

    /// USD price of the canonical (top-ranked) pair.
    async fn fetch_latest_price(&self, token_id: &str) -> Result<f64, PriceSourceError> {
        let pairs = self.fetch_pairs(token_id).await?;
        pairs
            .first()
            .map(|p| p.price_usd)
            .ok_or_else(|| PriceSourceError::NotFound(token_id.to_string()))
    }
}
