//! Wire types for `GET /latest/dex/tokens/{address}`.
//!
//! Everything optional is optional here; validation happens in
//! [`RawPair::into_candidate`] so the rest of the crate only sees
//! [`TradingPair`].

use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;

use crate::types::{Pair, TradingPair};

/// Pairs are kept as raw JSON here and decoded one by one, so a single
/// odd listing cannot spoil the whole response.
#[derive(Debug, Deserialize)]
pub struct TokenPairsResponse {
    #[serde(default)]
    pub pairs: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPair {
    pub chain_id: String,
    pub dex_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub pair_address: String,

    pub base_token: RawToken,
    pub quote_token: RawToken,

    pub price_usd: Option<String>,

    #[serde(default)]
    pub txns: RawTxnWindows,
    #[serde(default)]
    pub volume: RawWindows,
    #[serde(default)]
    pub price_change: RawWindows,
    pub liquidity: Option<RawLiquidity>,

    pub fdv: Option<f64>,
    pub market_cap: Option<f64>,
    /// Epoch milliseconds.
    pub pair_created_at: Option<i64>,

    pub info: Option<RawInfo>,
}

#[derive(Debug, Deserialize)]
pub struct RawToken {
    pub symbol: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawWindows {
    pub h24: Option<f64>,
    pub h1: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawTxnWindows {
    pub h1: Option<RawTxnCounts>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawTxnCounts {
    #[serde(default)]
    pub buys: Option<u64>,
    #[serde(default)]
    pub sells: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RawLiquidity {
    pub usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInfo {
    pub image_url: Option<String>,
}

impl RawPair {
    /// Decode one entry of `pairs`; `None` if it does not have the expected
    /// shape.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        serde_json::from_value(value)
            .inspect_err(|e| debug!(error = %e, "skipping malformed dexscreener pair"))
            .ok()
    }

    /// Convert into a ranking candidate: the typed pair plus its raw USD
    /// liquidity. Pairs without a usable USD price are rejected outright.
    pub fn into_candidate(self) -> Option<(TradingPair, Option<f64>)> {
        let price_usd = self
            .price_usd
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p > 0.0)?;

        let liquidity = self.liquidity.and_then(|l| l.usd);
        let txns_h1 = self.txns.h1.unwrap_or_default();

        let pair = TradingPair {
            pair: Pair::new(self.base_token.symbol, self.quote_token.symbol),
            chain_id: self.chain_id,
            dex_id: self.dex_id,
            pair_address: self.pair_address,
            price_usd,
            liquidity_usd: liquidity.unwrap_or_default(),
            volume_h24: self.volume.h24.unwrap_or_default(),
            volume_h1: self.volume.h1.unwrap_or_default(),
            price_change_h1: self.price_change.h1.unwrap_or_default(),
            buys_h1: txns_h1.buys.unwrap_or_default(),
            sells_h1: txns_h1.sells.unwrap_or_default(),
            market_cap: self.market_cap,
            fdv: self.fdv,
            created_at: self.pair_created_at.and_then(DateTime::from_timestamp_millis),
            url: self.url,
            image_url: self.info.and_then(|i| i.image_url),
        };

        Some((pair, liquidity))
    }
}
