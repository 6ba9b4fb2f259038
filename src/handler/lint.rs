//! Lint job handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::audit::AuditTrail;
use crate::error::{Error, Result};
use crate::model::audit::LintOutcome;
use crate::model::job::{JobKind, JobRequest};

use super::{CodeEngine, JobHandler, RuleStore, SnippetCatalog};

/// Lints a snippet with its owner's rules (lint requests carry no user) and
/// records the report in the audit trail.
pub struct LintHandler {
    catalog: Arc<dyn SnippetCatalog>,
    rules: Arc<dyn RuleStore>,
    engine: Arc<dyn CodeEngine>,
    trail: Arc<dyn AuditTrail>,
}

impl LintHandler {
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
impl JobHandler for LintHandler {
    fn kind(&self) -> JobKind {
        JobKind::Lint
    }

    async fn handle(&self, request: &JobRequest) -> Result<()> {
        let snippet = self
            .catalog
            .snippet(&request.snippet_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("snippet {}", request.snippet_id)))?;

        let rules = self.rules.rules_for(&snippet.owner).await?;
        let report = self.engine.lint(&snippet.code, &rules).await?;

        self.trail
            .record_lint(
                &snippet.id,
                LintOutcome {
                    valid: report.valid,
                    issues: report.issues,
                },
            )
            .await?;

        debug!(snippet = %snippet.id, "snippet linted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::fakes::{EchoRules, MemoryCatalog, RecordingTrail, StubEngine};
    use crate::handler::{LintReport, Snippet};
    use crate::model::audit::CodeIssue;
    use crate::model::job::{SnippetId, UserId};

    fn snippet() -> Snippet {
        Snippet {
            id: SnippetId::parse("snip-2").unwrap(),
            owner: UserId::new("owner-7"),
            code: "var y = 2".to_string(),
        }
    }

    fn request() -> JobRequest {
        JobRequest {
            snippet_id: SnippetId::parse("snip-2").unwrap(),
            user_id: None,
            kind: JobKind::Lint,
        }
    }

    #[tokio::test]
    async fn records_report_issues_in_engine_order() {
        let issues = vec![
            CodeIssue {
                message: "missing semicolon".to_string(),
                rule: Some("semi".to_string()),
                line: Some(1),
                column: Some(10),
            },
            CodeIssue {
                message: "prefer let".to_string(),
                rule: Some("no-var".to_string()),
                line: Some(1),
                column: Some(1),
            },
        ];
        let engine = StubEngine {
            lint_report: LintReport {
                valid: false,
                issues: issues.clone(),
            },
            ..StubEngine::default()
        };
        let trail = Arc::new(RecordingTrail::default());
        let handler = LintHandler::new(
            Arc::new(MemoryCatalog::default().with_snippet(snippet())),
            Arc::new(EchoRules),
            Arc::new(engine),
            trail.clone(),
        );

        handler.handle(&request()).await.unwrap();

        let lints = trail.lints.lock().unwrap();
        assert_eq!(lints.len(), 1);
        assert!(!lints[0].1.valid);
        assert_eq!(lints[0].1.issues, issues);
    }

    #[tokio::test]
    async fn uses_snippet_owner_rules() {
        let engine = StubEngine::default();
        let trail = Arc::new(RecordingTrail::default());
        let engine = Arc::new(engine);
        let handler = LintHandler::new(
            Arc::new(MemoryCatalog::default().with_snippet(snippet())),
            Arc::new(EchoRules),
            engine.clone(),
            trail,
        );

        handler.handle(&request()).await.unwrap();

        let seen = engine.seen_rules.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], serde_json::json!({ "user": "owner-7" }));
    }

    #[tokio::test]
    async fn missing_snippet_is_not_found_and_writes_nothing() {
        let trail = Arc::new(RecordingTrail::default());
        let handler = LintHandler::new(
            Arc::new(MemoryCatalog::default()),
            Arc::new(EchoRules),
            Arc::new(StubEngine::default()),
            trail.clone(),
        );

        let result = handler.handle(&request()).await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(trail.is_empty());
    }
}
