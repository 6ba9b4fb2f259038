//! Stream broker operations via direct SQLx calls to pgmq.
//!
//! One pgmq queue per topic. Calls pgmq's SQL functions: pgmq.create,
//! pgmq.send, pgmq.read_with_poll, pgmq.archive, pgmq.delete. Visibility
//! timeouts give at-least-once redelivery when a consumer dies mid-record;
//! archiving on completion keeps the consumed record for forensics.

use opentelemetry::KeyValue;

use crate::error::Result;
use crate::telemetry::metrics;

/// A record read from a topic.
#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub msg_id: i64,
    pub read_ct: i32,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
    pub vt: chrono::DateTime<chrono::Utc>,
    pub payload: serde_json::Value,
}

impl super::Db {
    /// Create a topic (idempotent).
    pub async fn create_topic(&self, topic: &str) -> Result<()> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(topic)
            .execute(self.pool())
            .await?;
        metrics::stream_operations().add(
            1,
            &[
                KeyValue::new("topic", topic.to_string()),
                KeyValue::new("operation", "create"),
            ],
        );
        Ok(())
    }

    /// Durably append one record to a topic. Returns the record id.
    /// The record is stored before this returns; on error nothing is written.
    pub async fn publish_raw(&self, topic: &str, payload: &serde_json::Value) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT pgmq.send($1, $2, 0)")
            .bind(topic)
            .bind(payload)
            .fetch_one(self.pool())
            .await?;
        metrics::stream_operations().add(
            1,
            &[
                KeyValue::new("topic", topic.to_string()),
                KeyValue::new("operation", "send"),
            ],
        );
        Ok(row.0)
    }

    /// Long-poll a topic for the next record, waiting at most
    /// `poll_timeout_secs`. Returns None if nothing arrived in time. The
    /// record stays invisible to other readers for `vt_secs`.
    pub async fn poll(
        &self,
        topic: &str,
        vt_secs: i32,
        poll_timeout_secs: i32,
    ) -> Result<Option<StreamRecord>> {
        let row = sqlx::query_as::<
            _,
            (
                i64,
                i32,
                chrono::DateTime<chrono::Utc>,
                chrono::DateTime<chrono::Utc>,
                serde_json::Value,
            ),
        >(
            "SELECT msg_id, read_ct, enqueued_at, vt, message FROM pgmq.read_with_poll($1, $2, 1, $3, 100)"
        )
        .bind(topic)
        .bind(vt_secs)
        .bind(poll_timeout_secs)
        .fetch_optional(self.pool())
        .await?;

        let record = row.map(|(msg_id, read_ct, enqueued_at, vt, payload)| StreamRecord {
            msg_id,
            read_ct,
            enqueued_at,
            vt,
            payload,
        });

        metrics::stream_operations().add(
            1,
            &[
                KeyValue::new("topic", topic.to_string()),
                KeyValue::new(
                    "operation",
                    if record.is_some() { "read" } else { "read_empty" },
                ),
            ],
        );

        Ok(record)
    }

    /// Acknowledge a record as consumed (moves it to the archive table).
    pub async fn ack(&self, topic: &str, msg_id: i64) -> Result<()> {
        sqlx::query("SELECT pgmq.archive($1, $2)")
            .bind(topic)
            .bind(msg_id)
            .execute(self.pool())
            .await?;
        metrics::stream_operations().add(
            1,
            &[
                KeyValue::new("topic", topic.to_string()),
                KeyValue::new("operation", "archive"),
            ],
        );
        Ok(())
    }

    /// Delete a record permanently, without archiving.
    pub async fn discard(&self, topic: &str, msg_id: i64) -> Result<()> {
        sqlx::query("SELECT pgmq.delete($1, $2)")
            .bind(topic)
            .bind(msg_id)
            .execute(self.pool())
            .await?;
        metrics::stream_operations().add(
            1,
            &[
                KeyValue::new("topic", topic.to_string()),
                KeyValue::new("operation", "delete"),
            ],
        );
        Ok(())
    }
}
