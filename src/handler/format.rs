//! Format job handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::audit::AuditTrail;
use crate::error::{Error, Result};
use crate::model::audit::FormatOutcome;
use crate::model::job::{JobKind, JobRequest};

use super::{CodeEngine, JobHandler, RuleStore, SnippetCatalog};

/// Formats a snippet with the requesting user's rules and records the
/// formatted code in the audit trail.
pub struct FormatHandler {
    catalog: Arc<dyn SnippetCatalog>,
    rules: Arc<dyn RuleStore>,
    engine: Arc<dyn CodeEngine>,
    trail: Arc<dyn AuditTrail>,
}

impl FormatHandler {
    pub fn new(
        catalog: Arc<dyn SnippetCatalog>,
        rules: Arc<dyn RuleStore>,
        engine: Arc<dyn CodeEngine>,
        trail: Arc<dyn AuditTrail>,
    ) -> Self {
        Self {
            catalog,
            rules,
            engine,
            trail,
        }
    }
}

#[async_trait]
impl JobHandler for FormatHandler {
    fn kind(&self) -> JobKind {
        JobKind::Format
    }

    async fn handle(&self, request: &JobRequest) -> Result<()> {
        let user = request
            .user_id
            .as_ref()
            .ok_or(Error::UserRequired(JobKind::Format))?;

        let snippet = self
            .catalog
            .snippet(&request.snippet_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("snippet {}", request.snippet_id)))?;

        let rules = self.rules.rules_for(user).await?;
        let formatted_code = self.engine.format(&snippet.code, &rules).await?;

        self.trail
            .record_format(&snippet.id, FormatOutcome { formatted_code })
            .await?;

        debug!(snippet = %snippet.id, user = %user, "snippet formatted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::fakes::{EchoRules, MemoryCatalog, RecordingTrail, StubEngine};
    use crate::handler::Snippet;
    use crate::model::job::{SnippetId, UserId};

    fn request(snippet: &str, user: &str) -> JobRequest {
        JobRequest {
            snippet_id: SnippetId::parse(snippet).unwrap(),
            user_id: Some(UserId::new(user)),
            kind: JobKind::Format,
        }
    }

    fn handler_with(
        catalog: MemoryCatalog,
        engine: StubEngine,
    ) -> (FormatHandler, Arc<RecordingTrail>) {
        let trail = Arc::new(RecordingTrail::default());
        let handler = FormatHandler::new(
            Arc::new(catalog),
            Arc::new(EchoRules),
            Arc::new(engine),
            trail.clone(),
        );
        (handler, trail)
    }

    #[tokio::test]
    async fn records_formatted_code_for_requesting_user() {
        let catalog = MemoryCatalog::default().with_snippet(Snippet {
            id: SnippetId::parse("snip-1").unwrap(),
            owner: UserId::new("owner-1"),
            code: "let x = 1;".to_string(),
        });
        let engine = StubEngine::default();
        let (handler, trail) = handler_with(catalog, engine);

        handler.handle(&request("snip-1", "user-9")).await.unwrap();

        let formats = trail.formats.lock().unwrap();
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].0.as_str(), "snip-1");
        assert_eq!(formats[0].1.formatted_code, "LET X = 1;");
    }

    #[tokio::test]
    async fn missing_snippet_is_not_found_and_writes_nothing() {
        let (handler, trail) = handler_with(MemoryCatalog::default(), StubEngine::default());

        let result = handler.handle(&request("gone", "user-9")).await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(trail.is_empty());
    }

    #[tokio::test]
    async fn engine_failure_propagates_and_writes_nothing() {
        let catalog = MemoryCatalog::default().with_snippet(Snippet {
            id: SnippetId::parse("snip-1").unwrap(),
            owner: UserId::new("owner-1"),
            code: "let x = 1;".to_string(),
        });
        let engine = StubEngine {
            fail_with: Some("formatter crashed".to_string()),
            ..StubEngine::default()
        };
        let (handler, trail) = handler_with(catalog, engine);

        let result = handler.handle(&request("snip-1", "user-9")).await;

        assert!(matches!(result, Err(Error::Other(_))));
        assert!(trail.is_empty());
    }

    #[tokio::test]
    async fn request_without_user_is_rejected() {
        let (handler, trail) = handler_with(MemoryCatalog::default(), StubEngine::default());

        let request = JobRequest {
            snippet_id: SnippetId::parse("snip-1").unwrap(),
            user_id: None,
            kind: JobKind::Format,
        };
        let result = handler.handle(&request).await;

        assert!(matches!(result, Err(Error::UserRequired(JobKind::Format))));
        assert!(trail.is_empty());
    }
}
