use chrono::{DateTime, Utc};

/// Base/quote symbol pair of a listing, e.g. `PEPE/WETH`.
#[derive(Debug, Clone, Eq, PartialEq, std::hash::Hash)]
pub struct Pair {
    pub base: String,
    pub quote: String,
}

impl Pair {
    pub fn new(base: String, quote: String) -> Self {
        Self { base, quote }
    }

    pub fn id(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

/// A single market listing of a token, already validated at the client boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingPair {
    pub pair: Pair,

    pub chain_id: String,
    pub dex_id: String,
    pub pair_address: String,

    pub price_usd: f64,
    pub liquidity_usd: f64,

    pub volume_h24: f64,
    pub volume_h1: f64,
    pub price_change_h1: f64,
    pub buys_h1: u64,
    pub sells_h1: u64,

    pub market_cap: Option<f64>,
    pub fdv: Option<f64>,

    pub created_at: Option<DateTime<Utc>>,
    pub url: String,
    pub image_url: Option<String>,
}

impl TradingPair {
    /// Whole days since the pair was created, if the listing reports it.
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.created_at.map(|c| (now - c).num_days())
    }
}
