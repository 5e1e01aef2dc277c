use tracing::{Span, field};

use super::TraceId;

/// Create a root span for a poll tick / command
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id.as_str(),
        token_id = field::Empty
    )
}

/// Create a child span (inherits trace_id automatically)
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!("child", name = %name, token_id = field::Empty)
}

/// Record the token being processed on the current span.
pub fn annotate_token(token_id: &str) {
    Span::current().record("token_id", field::display(token_id));
}
