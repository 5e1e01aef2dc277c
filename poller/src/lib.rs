//! Periodic evaluation of registered alerts.
//!
//! Each tick:
//!   1. Snapshots the registry.
//!   2. Fetches the latest price per alert (bounded, concurrent).
//!   3. Evaluates band membership and suppression via `band`.
//!   4. Hands firing alerts to the `Notifier` and records the fire time.

pub mod band;
pub mod engine;
pub mod notifier;
pub mod types;

pub use engine::AlertPoller;
pub use notifier::{AlertEvent, LogNotifier, Notifier, NotifyError};
pub use types::{PollerConfig, RecordOutcome, TickReport};
