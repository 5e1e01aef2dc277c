use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::dexscreener::types::{RawPair, TokenPairsResponse};
use crate::error::PriceSourceError;
use crate::ranking::rank_pairs;
use crate::source::PriceSource;
use crate::types::TradingPair;

pub const DEFAULT_BASE_URL: &str = "https://api.dexscreener.com";

#[derive(Clone)]
pub struct DexScreenerClient {
    http: Client,
    url: String,
}

impl DexScreenerClient {
    /// `url` is the API origin, e.g. [`DEFAULT_BASE_URL`]. `timeout` bounds
    /// each request end to end.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PriceSourceError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
        })
    }

    fn tokens_url(&self, token_id: &str) -> String {
        format!("{}/latest/dex/tokens/{}", self.url, token_id)
    }
}

#[async_trait]
impl PriceSource for DexScreenerClient {
    #[instrument(skip(self), fields(token_id = %token_id), level = "debug")]
    async fn fetch_pairs(&self, token_id: &str) -> Result<Vec<TradingPair>, PriceSourceError> {
        let resp = self.http.get(self.tokens_url(token_id)).send().await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PriceSourceError::NotFound(token_id.to_string()));
        }
        if !status.is_success() {
            warn!(status = %status, "dexscreener returned non-success status");
            return Err(PriceSourceError::UpstreamUnavailable(format!(
                "dexscreener returned {status}"
            )));
        }

        let body = resp.bytes().await?;
        let envelope: TokenPairsResponse = serde_json::from_slice(&body).map_err(|e| {
            PriceSourceError::UpstreamUnavailable(format!("malformed dexscreener payload: {e}"))
        })?;

        let raw = envelope.pairs.unwrap_or_default();
        let listed = raw.len();
        let ranked = rank_pairs(
            raw.into_iter()
                .filter_map(RawPair::from_json)
                .filter_map(RawPair::into_candidate),
        );

        debug!(listed, ranked = ranked.len(), "dexscreener pairs fetched");

        if ranked.is_empty() {
            return Err(PriceSourceError::NotFound(token_id.to_string()));
        }

        Ok(ranked)
    }
}
