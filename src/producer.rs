//! Publish side: typed job requests onto their kind's topic.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tracing::debug;

use crate::config::StreamConfig;
use crate::db::Db;
use crate::error::{Error, Result};
use crate::model::job::{JobKind, JobRequest, SnippetId, UserId};
use crate::telemetry::metrics;

/// Publishes job requests. Fire-and-forget from the caller's perspective:
/// the record is durably stored by the broker before `publish` returns, but
/// nothing waits for consumption.
pub struct JobProducer {
    db: Arc<Db>,
    stream: StreamConfig,
}

impl JobProducer {
    pub fn new(db: Arc<Db>, stream: StreamConfig) -> Self {
        Self { db, stream }
    }

    /// Validate inputs, serialize, and durably append one record to the
    /// kind's topic. On error nothing has been written.
    pub async fn publish(
        &self,
        kind: JobKind,
        snippet_id: &str,
        user_id: Option<&str>,
    ) -> Result<()> {
        let request = build_request(kind, snippet_id, user_id)?;
        let payload = request.encode()?;
        let topic = &self.stream.binding(kind).topic;

        let msg_id = self.db.publish_raw(topic, &payload).await?;
        metrics::jobs_published().add(1, &[KeyValue::new("kind", kind.to_string())]);
        debug!(%kind, snippet = %request.snippet_id, msg_id, "job published");
        Ok(())
    }

    pub async fn publish_format(&self, snippet_id: &str, user_id: &str) -> Result<()> {
        self.publish(JobKind::Format, snippet_id, Some(user_id)).await
    }

    pub async fn publish_lint(&self, snippet_id: &str) -> Result<()> {
        self.publish(JobKind::Lint, snippet_id, None).await
    }

    pub async fn publish_test_execution(&self, snippet_id: &str, user_id: &str) -> Result<()> {
        self.publish(JobKind::TestExecution, snippet_id, Some(user_id))
            .await
    }
}

/// Input contract: a syntactically valid snippet id always; a user id for
/// the kinds that run under a user's rule configuration, none for lint.
pub(crate) fn build_request(
    kind: JobKind,
    snippet_id: &str,
    user_id: Option<&str>,
) -> Result<JobRequest> {
    let snippet_id = SnippetId::parse(snippet_id)?;
    let user_id = match (kind.requires_user(), user_id) {
        (true, Some(user)) => Some(UserId::new(user)),
        (true, None) => return Err(Error::UserRequired(kind)),
        (false, None) => None,
        (false, Some(_)) => return Err(Error::UserForbidden(kind)),
    };
    Ok(JobRequest {
        snippet_id,
        user_id,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_requires_a_user() {
        assert!(matches!(
            build_request(JobKind::Format, "snip-1", None),
            Err(Error::UserRequired(JobKind::Format))
        ));
        let request = build_request(JobKind::Format, "snip-1", Some("user-1")).unwrap();
        assert_eq!(request.user_id.as_ref().unwrap().as_str(), "user-1");
    }

    #[test]
    fn test_execution_requires_a_user() {
        assert!(matches!(
            build_request(JobKind::TestExecution, "snip-1", None),
            Err(Error::UserRequired(JobKind::TestExecution))
        ));
    }

    #[test]
    fn lint_rejects_a_user() {
        assert!(matches!(
            build_request(JobKind::Lint, "snip-1", Some("user-1")),
            Err(Error::UserForbidden(JobKind::Lint))
        ));
        let request = build_request(JobKind::Lint, "snip-1", None).unwrap();
        assert!(request.user_id.is_none());
    }

    #[test]
    fn invalid_snippet_id_is_rejected_before_any_write() {
        assert!(matches!(
            build_request(JobKind::Lint, "no spaces allowed", None),
            Err(Error::InvalidSnippetId(_))
        ));
    }
}
