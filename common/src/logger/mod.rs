mod init;
mod macros;
mod perf;
mod trace_id;

pub use init::init_logger;
pub use macros::{annotate_token, child_span, root_span};
pub use perf::warn_if_slow;
pub use trace_id::TraceId;
