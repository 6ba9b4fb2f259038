//! Metric instrument factories for snipq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"snipq"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for snipq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("snipq")
}

/// Counter: job requests published to the stream.
/// Labels: `kind`.
pub fn jobs_published() -> Counter<u64> {
    meter()
        .u64_counter("snipq.jobs.published")
        .with_description("Number of job requests published")
        .build()
}

/// Counter: records pulled off a topic and dispatched.
/// Labels: `topic`, `disposition` ("handled" | "skipped_missing" |
/// "skipped_malformed" | "failed").
pub fn records_processed() -> Counter<u64> {
    meter()
        .u64_counter("snipq.consumer.records")
        .with_description("Number of stream records dispatched")
        .build()
}

/// Counter: broker-level operations (create, send, read, archive, delete).
/// Labels: `topic`, `operation`.
pub fn stream_operations() -> Counter<u64> {
    meter()
        .u64_counter("snipq.stream.operations")
        .with_description("Number of stream broker operations")
        .build()
}

/// Counter: audit trail writes.
/// Labels: `tag`.
pub fn audit_writes() -> Counter<u64> {
    meter()
        .u64_counter("snipq.audit.writes")
        .with_description("Number of audit logs written")
        .build()
}

/// Histogram: handler execution duration in milliseconds.
/// Labels: `kind`.
pub fn job_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("snipq.job.duration_ms")
        .with_description("Job handler duration in milliseconds")
        .with_unit("ms")
        .build()
}
