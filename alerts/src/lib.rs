pub mod error;
pub mod model;
pub mod registry;
pub mod store;

pub use error::AlertError;
pub use model::{AlertRecord, Owner, TokenId};
pub use registry::{AlertRegistry, Observed, Revision};
pub use store::AlertStore;
