//! Test execution job handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::audit::AuditTrail;
use crate::error::{Error, Result};
use crate::model::audit::TestRunOutcome;
use crate::model::job::{JobKind, JobRequest};

use super::{CodeEngine, JobHandler, SnippetCatalog};

/// Runs every test attached to a snippet and records one audit log per run,
/// keyed by the test's id.
pub struct TestExecutionHandler {
    catalog: Arc<dyn SnippetCatalog>,
    engine: Arc<dyn CodeEngine>,
    trail: Arc<dyn AuditTrail>,
}

impl TestExecutionHandler {
    pub fn new(
        catalog: Arc<dyn SnippetCatalog>,
        engine: Arc<dyn CodeEngine>,
        trail: Arc<dyn AuditTrail>,
    ) -> Self {
        Self {
            catalog,
            engine,
            trail,
        }
    }
}

#[async_trait]
impl JobHandler for TestExecutionHandler {
    fn kind(&self) -> JobKind {
        JobKind::TestExecution
    }

    async fn handle(&self, request: &JobRequest) -> Result<()> {
        let snippet = self
            .catalog
            .snippet(&request.snippet_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("snippet {}", request.snippet_id)))?;

        let tests = self.catalog.tests_for_snippet(&snippet.id).await?;
        if tests.is_empty() {
            debug!(snippet = %snippet.id, "no tests attached, nothing to run");
            return Ok(());
        }

        let runs = self.engine.run_tests(&snippet, &tests).await?;
        for run in runs {
            self.trail
                .record_test_execution(TestRunOutcome {
                    test_id: run.test_id,
                    passed: run.passed,
                    failures: run.failures,
                })
                .await?;
        }

        debug!(snippet = %snippet.id, tests = tests.len(), "test execution recorded");
        Ok(())
    }
}
