pub mod json_store;

pub use json_store::JsonFileStore;

use crate::model::AlertRecord;

/// Durable snapshot of every active alert.
///
/// `save` replaces the whole snapshot; there is no per-record write path.
#[async_trait::async_trait]
pub trait AlertStore: Send + Sync {
    /// Empty when nothing was ever saved. An error means a snapshot exists
    /// but cannot be trusted.
    async fn load(&self) -> anyhow::Result<Vec<AlertRecord>>;
    async fn save(&self, alerts: &[AlertRecord]) -> anyhow::Result<()>;
}
