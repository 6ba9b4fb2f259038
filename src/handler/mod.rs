//! Job handlers and the collaborator seams they call across.
//!
//! The snippet/test catalog, the per-user rule configuration, and the code
//! engine all live in other services; handlers see them only as trait
//! objects. Each handler resolves its entities, invokes the engine, and
//! records the outcome in the audit trail. Handlers are idempotent with
//! respect to audit writes: re-running a job appends a new log, never
//! mutates a prior one.

pub mod format;
pub mod lint;
pub mod test_run;

pub use format::FormatHandler;
pub use lint::LintHandler;
pub use test_run::TestExecutionHandler;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::audit::CodeIssue;
use crate::model::job::{JobKind, JobRequest, SnippetId, TestId, UserId};

/// Rule configuration as served by the rule-config store. Opaque here; only
/// the code engine interprets it.
pub type Rules = serde_json::Value;

/// A code snippet as resolved from the catalog.
#[derive(Debug, Clone)]
pub struct Snippet {
    pub id: SnippetId,
    pub owner: UserId,
    pub code: String,
}

/// A test case attached to a snippet.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub id: TestId,
    pub snippet_id: SnippetId,
    pub name: String,
}

/// Lint result as produced by the code engine.
#[derive(Debug, Clone)]
pub struct LintReport {
    pub valid: bool,
    pub issues: Vec<CodeIssue>,
}

/// One executed test, as reported by the code engine.
#[derive(Debug, Clone)]
pub struct TestRun {
    pub test_id: TestId,
    pub passed: bool,
    pub failures: Vec<String>,
}

/// Snippet and test lookup.
#[async_trait]
pub trait SnippetCatalog: Send + Sync {
    async fn snippet(&self, id: &SnippetId) -> Result<Option<Snippet>>;
    async fn test(&self, id: &TestId) -> Result<Option<TestCase>>;
    async fn tests_for_snippet(&self, id: &SnippetId) -> Result<Vec<TestCase>>;
}

/// Per-user rule configuration lookup.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn rules_for(&self, user: &UserId) -> Result<Rules>;
}

/// The formatting/linting/test-running engine.
#[async_trait]
pub trait CodeEngine: Send + Sync {
    async fn format(&self, code: &str, rules: &Rules) -> Result<String>;
    async fn lint(&self, code: &str, rules: &Rules) -> Result<LintReport>;
    async fn run_tests(&self, snippet: &Snippet, tests: &[TestCase]) -> Result<Vec<TestRun>>;
}

/// Kind-specific business logic bound to one topic's consumer.
///
/// Implementations must be safe to invoke concurrently for distinct records.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn kind(&self) -> JobKind;
    async fn handle(&self, request: &JobRequest) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-memory collaborators for handler and dispatch tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::audit::AuditTrail;
    use crate::error::{Error, Result};
    use crate::model::audit::{
        AuditEntry, AuditTag, ExecutionResult, FormatOutcome, LintOutcome, SnippetRunOutcome,
        StatusView, TestRunOutcome, ValidationOutcome,
    };
    use crate::model::job::{SnippetId, TestId, UserId};

    use super::{CodeEngine, LintReport, RuleStore, Rules, Snippet, SnippetCatalog, TestCase, TestRun};

    #[derive(Default)]
    pub struct MemoryCatalog {
        pub snippets: HashMap<String, Snippet>,
        pub tests: HashMap<String, Vec<TestCase>>,
    }

    impl MemoryCatalog {
        pub fn with_snippet(mut self, snippet: Snippet) -> Self {
            self.snippets.insert(snippet.id.as_str().to_string(), snippet);
            self
        }

        pub fn with_tests(mut self, snippet_id: &str, tests: Vec<TestCase>) -> Self {
            self.tests.insert(snippet_id.to_string(), tests);
            self
        }
    }

    #[async_trait]
    impl SnippetCatalog for MemoryCatalog {
        async fn snippet(&self, id: &SnippetId) -> Result<Option<Snippet>> {
            Ok(self.snippets.get(id.as_str()).cloned())
        }

        async fn test(&self, id: &TestId) -> Result<Option<TestCase>> {
            Ok(self
                .tests
                .values()
                .flatten()
                .find(|t| t.id == *id)
                .cloned())
        }

        async fn tests_for_snippet(&self, id: &SnippetId) -> Result<Vec<TestCase>> {
            Ok(self.tests.get(id.as_str()).cloned().unwrap_or_default())
        }
    }

    /// Returns `{"user": <id>}` so tests can assert whose rules were used.
    pub struct EchoRules;

    #[async_trait]
    impl RuleStore for EchoRules {
        async fn rules_for(&self, user: &UserId) -> Result<Rules> {
            Ok(serde_json::json!({ "user": user.as_str() }))
        }
    }

    /// Engine stub: formats by uppercasing, lints with a fixed report, runs
    /// every test with a scripted result.
    pub struct StubEngine {
        pub lint_report: LintReport,
        pub test_runs: Vec<TestRun>,
        pub fail_with: Option<String>,
        pub seen_rules: Mutex<Vec<Rules>>,
    }

    impl Default for StubEngine {
        fn default() -> Self {
            Self {
                lint_report: LintReport {
                    valid: true,
                    issues: Vec::new(),
                },
                test_runs: Vec::new(),
                fail_with: None,
                seen_rules: Mutex::new(Vec::new()),
            }
        }
    }

    impl StubEngine {
        fn check_failure(&self) -> Result<()> {
            match self.fail_with {
                Some(ref message) => Err(Error::Other(message.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl CodeEngine for StubEngine {
        async fn format(&self, code: &str, rules: &Rules) -> Result<String> {
            self.check_failure()?;
            self.seen_rules.lock().unwrap().push(rules.clone());
            Ok(code.to_uppercase())
        }

        async fn lint(&self, code: &str, rules: &Rules) -> Result<LintReport> {
            self.check_failure()?;
            let _ = code;
            self.seen_rules.lock().unwrap().push(rules.clone());
            Ok(self.lint_report.clone())
        }

        async fn run_tests(&self, _snippet: &Snippet, tests: &[TestCase]) -> Result<Vec<TestRun>> {
            self.check_failure()?;
            assert_eq!(tests.len(), self.test_runs.len());
            Ok(self.test_runs.clone())
        }
    }

    /// Records every write; reads serve the recorded writes back in a
    /// simplified latest-wins fashion.
    #[derive(Default)]
    pub struct RecordingTrail {
        pub formats: Mutex<Vec<(SnippetId, FormatOutcome)>>,
        pub lints: Mutex<Vec<(SnippetId, LintOutcome)>>,
        pub validations: Mutex<Vec<(SnippetId, ValidationOutcome)>>,
        pub test_runs: Mutex<Vec<TestRunOutcome>>,
        pub snippet_runs: Mutex<Vec<(SnippetId, SnippetRunOutcome)>>,
    }

    impl RecordingTrail {
        pub fn is_empty(&self) -> bool {
            self.formats.lock().unwrap().is_empty()
                && self.lints.lock().unwrap().is_empty()
                && self.validations.lock().unwrap().is_empty()
                && self.test_runs.lock().unwrap().is_empty()
                && self.snippet_runs.lock().unwrap().is_empty()
        }
    }

    #[async_trait]
    impl AuditTrail for RecordingTrail {
        async fn record_validation(
            &self,
            snippet: &SnippetId,
            outcome: ValidationOutcome,
        ) -> Result<()> {
            self.validations
                .lock()
                .unwrap()
                .push((snippet.clone(), outcome));
            Ok(())
        }

        async fn record_lint(&self, snippet: &SnippetId, outcome: LintOutcome) -> Result<()> {
            self.lints.lock().unwrap().push((snippet.clone(), outcome));
            Ok(())
        }

        async fn record_format(&self, snippet: &SnippetId, outcome: FormatOutcome) -> Result<()> {
            self.formats.lock().unwrap().push((snippet.clone(), outcome));
            Ok(())
        }

        async fn record_test_execution(&self, outcome: TestRunOutcome) -> Result<()> {
            self.test_runs.lock().unwrap().push(outcome);
            Ok(())
        }

        async fn record_snippet_execution(
            &self,
            snippet: &SnippetId,
            outcome: SnippetRunOutcome,
        ) -> Result<()> {
            self.snippet_runs
                .lock()
                .unwrap()
                .push((snippet.clone(), outcome));
            Ok(())
        }

        async fn entries(&self, _entity: &str, _tag: Option<AuditTag>) -> Result<Vec<AuditEntry>> {
            Ok(Vec::new())
        }

        async fn latest_status(&self, _entity: &str, _tag: AuditTag) -> Result<StatusView> {
            Ok(StatusView::pending())
        }

        async fn execution_history(&self, _test: &TestId) -> Result<Vec<ExecutionResult>> {
            Ok(Vec::new())
        }

        async fn formatted_version(&self, snippet: &SnippetId) -> Result<Option<String>> {
            Ok(self
                .formats
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(id, _)| id == snippet)
                .map(|(_, outcome)| outcome.formatted_code.clone()))
        }
    }
}
