//! Consume side: one long-lived poll loop per (topic, consumer group).
//!
//! The loop long-polls the broker with a bounded timeout, dispatches each
//! record to its handler, and advances past the record whatever the outcome.
//! Handler failures never crash the loop: a missing entity is the expected
//! enqueue/delete race and is skipped quietly; anything else is logged with
//! full context and dropped (deliberate at-most-once effect, no requeue).
//! Shutdown is observed only between records, so an in-flight record always
//! finishes before the task exits.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tokio::sync::Notify;
use tracing::{Instrument, error, info, warn};

use crate::db::Db;
use crate::error::{Error, Result};
use crate::handler::JobHandler;
use crate::model::job::JobRequest;
use crate::telemetry::job::{record_disposition, start_dispatch_span};
use crate::telemetry::metrics;

/// Per-consumer tunables, bound to one (topic, group) pair from deployment
/// configuration.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub topic: String,
    pub group: String,
    /// How long a delivered record stays invisible to competing readers.
    pub visibility_timeout_secs: i32,
    /// Bounded long-poll wait per broker read.
    pub poll_timeout_secs: i32,
}

/// What became of one dispatched record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Handled,
    SkippedMissing,
    SkippedMalformed,
    Failed,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Handled => "handled",
            Disposition::SkippedMissing => "skipped_missing",
            Disposition::SkippedMalformed => "skipped_malformed",
            Disposition::Failed => "failed",
        }
    }
}

/// Long-running poller bound to one topic and one consumer group.
pub struct Consumer {
    db: Arc<Db>,
    handler: Arc<dyn JobHandler>,
    config: ConsumerConfig,
    shutdown: Arc<Notify>,
}

impl Consumer {
    pub fn new(db: Arc<Db>, handler: Arc<dyn JobHandler>, config: ConsumerConfig) -> Self {
        Self {
            db,
            handler,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle for signalling this consumer to stop after the in-flight
    /// record, if any, completes.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Run the poll loop until shutdown is signalled.
    pub async fn run(&self) -> Result<()> {
        info!(
            topic = %self.config.topic,
            group = %self.config.group,
            kind = %self.handler.kind(),
            "consumer started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!(topic = %self.config.topic, group = %self.config.group, "consumer shutting down");
                    return Ok(());
                }
                polled = self.db.poll(
                    &self.config.topic,
                    self.config.visibility_timeout_secs,
                    self.config.poll_timeout_secs,
                ) => {
                    match polled {
                        Ok(Some(record)) => {
                            let span = start_dispatch_span(&self.config.topic, record.msg_id);
                            let start = Instant::now();
                            let disposition = process_record(self.handler.as_ref(), &record.payload)
                                .instrument(span.clone())
                                .await;
                            record_disposition(&span, disposition.as_str());

                            metrics::records_processed().add(
                                1,
                                &[
                                    KeyValue::new("topic", self.config.topic.clone()),
                                    KeyValue::new("disposition", disposition.as_str()),
                                ],
                            );
                            metrics::job_duration_ms().record(
                                start.elapsed().as_millis() as f64,
                                &[KeyValue::new("kind", self.handler.kind().to_string())],
                            );

                            // The record is consumed regardless of disposition.
                            if let Err(e) = self.db.ack(&self.config.topic, record.msg_id).await {
                                error!(
                                    topic = %self.config.topic,
                                    msg_id = record.msg_id,
                                    error = %e,
                                    "failed to ack record, broker will redeliver"
                                );
                            }
                        }
                        Ok(None) => {
                            // Long poll expired with nothing to do; loop and wait again.
                        }
                        Err(e) => {
                            error!(topic = %self.config.topic, error = %e, "broker poll failed");
                            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }
    }
}

/// Decode one record and run it through the handler, classifying the result.
/// Never returns an error: every failure mode maps to a disposition so the
/// poll loop always advances.
pub(crate) async fn process_record(
    handler: &dyn JobHandler,
    payload: &serde_json::Value,
) -> Disposition {
    let request = match JobRequest::decode(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, %payload, "unreadable record skipped");
            return Disposition::SkippedMalformed;
        }
    };

    match handler.handle(&request).await {
        Ok(()) => Disposition::Handled,
        Err(Error::NotFound(what)) => {
            // Entity deleted between enqueue and processing: the one
            // anticipated race. Nothing was written.
            warn!(%what, snippet = %request.snippet_id, "entity gone before processing, skipping");
            Disposition::SkippedMissing
        }
        Err(e) => {
            error!(
                snippet = %request.snippet_id,
                kind = %request.kind,
                error = %e,
                "handler failed, record dropped without retry"
            );
            Disposition::Failed
        }
    }
}
