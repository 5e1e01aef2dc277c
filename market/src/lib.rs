//! Market data for watched tokens.
//!
//! The rest of the workspace only sees [`PriceSource`] and the typed
//! [`TradingPair`]; the DexScreener payload never leaves `dexscreener`.

pub mod dexscreener;
pub mod error;
pub mod ranking;
pub mod source;
pub mod types;

pub use dexscreener::DexScreenerClient;
pub use error::PriceSourceError;
pub use source::PriceSource;
pub use types::{Pair, TradingPair};
