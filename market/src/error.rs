use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceSourceError {
    /// The upstream knows nothing tradable for this token.
    #[error("no trading pairs found for token {0}")]
    NotFound(String),

    /// Network failure, timeout, non-2xx status or a payload we could not parse.
    #[error("price source unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl PriceSourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PriceSourceError::NotFound(_))
    }
}

impl From<reqwest::Error> for PriceSourceError {
    fn from(e: reqwest::Error) -> Self {
        PriceSourceError::UpstreamUnavailable(e.to_string())
    }
}
