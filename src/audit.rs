//! The audit trail surface: one write operation per tag, typed reads back.
//!
//! Trait boundary so handlers depend on the surface, not the Postgres
//! adapter; [`crate::db::Db`] is the production implementation.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::audit::{
    AuditEntry, AuditTag, ExecutionResult, FormatOutcome, LintOutcome, SnippetRunOutcome,
    StatusView, TestRunOutcome, ValidationOutcome,
};
use crate::model::job::{SnippetId, TestId};

/// Append-only record of processing events, queryable by entity and tag.
///
/// Writes never mutate: re-recording an outcome for the same entity appends a
/// new log and latest-wins on the status reads.
#[async_trait]
pub trait AuditTrail: Send + Sync {
    async fn record_validation(&self, snippet: &SnippetId, outcome: ValidationOutcome)
    -> Result<()>;

    async fn record_lint(&self, snippet: &SnippetId, outcome: LintOutcome) -> Result<()>;

    async fn record_format(&self, snippet: &SnippetId, outcome: FormatOutcome) -> Result<()>;

    async fn record_test_execution(&self, outcome: TestRunOutcome) -> Result<()>;

    async fn record_snippet_execution(
        &self,
        snippet: &SnippetId,
        outcome: SnippetRunOutcome,
    ) -> Result<()>;

    /// All logs for an entity (snippet or test), newest first, optionally
    /// narrowed to one tag.
    async fn entries(&self, entity: &str, tag: Option<AuditTag>) -> Result<Vec<AuditEntry>>;

    /// Most recent status for the (entity, tag) pair; the pending sentinel
    /// when no event has been recorded yet.
    async fn latest_status(&self, entity: &str, tag: AuditTag) -> Result<StatusView>;

    /// All recorded runs of one test, newest first.
    async fn execution_history(&self, test: &TestId) -> Result<Vec<ExecutionResult>>;

    /// The formatted code from the most recent format event, if any.
    async fn formatted_version(&self, snippet: &SnippetId) -> Result<Option<String>>;
}
