pub mod client;
pub mod types;

pub use client::{DEFAULT_BASE_URL, DexScreenerClient};
