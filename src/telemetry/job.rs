//! Dispatch span helpers.
//!
//! One span per record pulled off a topic, carrying the topic, job kind and
//! broker message id so a job can be traced from publish to audit write.

use tracing::Span;

/// Start a span covering one record's dispatch.
///
/// The `job.disposition` field is declared empty and filled in via
/// [`record_disposition`] once classification is known.
pub fn start_dispatch_span(topic: &str, msg_id: i64) -> Span {
    tracing::info_span!(
        "job.dispatch",
        "job.topic" = topic,
        "job.msg_id" = msg_id,
        "job.disposition" = tracing::field::Empty,
    )
}

/// Record the dispatch outcome on the span.
pub fn record_disposition(span: &Span, disposition: &str) {
    span.record("job.disposition", disposition);
}
