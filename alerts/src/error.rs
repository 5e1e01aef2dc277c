use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlertError {
    #[error("target price must be a positive number, got {0}")]
    InvalidTarget(f64),

    /// The store rejected a write; the in-memory change was rolled back.
    #[error("failed to persist alerts: {0}")]
    PersistenceFailed(String),

    /// A snapshot exists but could not be read back.
    #[error("alert snapshot is unreadable: {0}")]
    CorruptState(String),
}
