//! Typed audit outcomes and read-side views.
//!
//! The storage layer keeps outcome attributes as loose name/value rows; this
//! module is the strongly-typed shape everything above that boundary works
//! with. One [`AuditDetails`] variant per tag, decoded strictly from the rows
//! attached to a log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::model::job::{SnippetId, TestId};

// ---------------------------------------------------------------------------
// Tag vocabulary
// ---------------------------------------------------------------------------

/// Classification of an audit event. Seeded as reference data at startup;
/// a write referencing an unseeded tag fails loudly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditTag {
    Validation,
    Lint,
    Format,
    TestExecution,
    SnippetExecution,
}

impl AuditTag {
    pub const ALL: [AuditTag; 5] = [
        AuditTag::Validation,
        AuditTag::Lint,
        AuditTag::Format,
        AuditTag::TestExecution,
        AuditTag::SnippetExecution,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditTag::Validation => "validation",
            AuditTag::Lint => "lint",
            AuditTag::Format => "format",
            AuditTag::TestExecution => "test_execution",
            AuditTag::SnippetExecution => "snippet_execution",
        }
    }

    /// Test execution events attach to a test; every other tag attaches to a
    /// snippet.
    pub fn attaches_to_test(self) -> bool {
        matches!(self, AuditTag::TestExecution)
    }
}

impl std::fmt::Display for AuditTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "validation" => Ok(AuditTag::Validation),
            "lint" => Ok(AuditTag::Lint),
            "format" => Ok(AuditTag::Format),
            "test_execution" => Ok(AuditTag::TestExecution),
            "snippet_execution" => Ok(AuditTag::SnippetExecution),
            _ => Err(Error::Other(format!("unknown audit tag: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Union of the per-tag status vocabularies. `Pending` is the read-side
/// sentinel for "no event recorded yet" and is never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Pending,
    Valid,
    Invalid,
    Passed,
    Failed,
    Success,
    Error,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Pending => "pending",
            AuditStatus::Valid => "valid",
            AuditStatus::Invalid => "invalid",
            AuditStatus::Passed => "passed",
            AuditStatus::Failed => "failed",
            AuditStatus::Success => "success",
            AuditStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "pending" => Ok(AuditStatus::Pending),
            "valid" => Ok(AuditStatus::Valid),
            "invalid" => Ok(AuditStatus::Invalid),
            "passed" => Ok(AuditStatus::Passed),
            "failed" => Ok(AuditStatus::Failed),
            "success" => Ok(AuditStatus::Success),
            "error" => Ok(AuditStatus::Error),
            _ => Err(Error::Other(format!("unknown audit status: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Structured sub-errors
// ---------------------------------------------------------------------------

/// One structured issue reported by validation or lint. Validation issues
/// carry no rule name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeIssue {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

// ---------------------------------------------------------------------------
// Decoded event details
// ---------------------------------------------------------------------------

/// The typed payload of one audit log, one variant per tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum AuditDetails {
    Validation {
        status: AuditStatus,
        issues: Vec<CodeIssue>,
    },
    Lint {
        status: AuditStatus,
        issues: Vec<CodeIssue>,
    },
    Format {
        status: AuditStatus,
        formatted_code: Option<String>,
    },
    TestExecution {
        status: AuditStatus,
        failures: Vec<String>,
    },
    SnippetExecution {
        status: AuditStatus,
        output: Option<String>,
    },
}

impl AuditDetails {
    pub fn tag(&self) -> AuditTag {
        match self {
            AuditDetails::Validation { .. } => AuditTag::Validation,
            AuditDetails::Lint { .. } => AuditTag::Lint,
            AuditDetails::Format { .. } => AuditTag::Format,
            AuditDetails::TestExecution { .. } => AuditTag::TestExecution,
            AuditDetails::SnippetExecution { .. } => AuditTag::SnippetExecution,
        }
    }

    pub fn status(&self) -> AuditStatus {
        match self {
            AuditDetails::Validation { status, .. }
            | AuditDetails::Lint { status, .. }
            | AuditDetails::Format { status, .. }
            | AuditDetails::TestExecution { status, .. }
            | AuditDetails::SnippetExecution { status, .. } => *status,
        }
    }

    /// Structured issues, for the tags that carry them.
    pub fn issues(&self) -> &[CodeIssue] {
        match self {
            AuditDetails::Validation { issues, .. } | AuditDetails::Lint { issues, .. } => issues,
            _ => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Write-side outcomes
// ---------------------------------------------------------------------------

/// Outcome of validating a snippet.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub issues: Vec<CodeIssue>,
}

/// Outcome of linting a snippet.
#[derive(Debug, Clone)]
pub struct LintOutcome {
    pub valid: bool,
    pub issues: Vec<CodeIssue>,
}

/// Outcome of formatting a snippet. Only successful formats are recorded;
/// an engine failure propagates instead of producing a log.
#[derive(Debug, Clone)]
pub struct FormatOutcome {
    pub formatted_code: String,
}

/// Outcome of one test run.
#[derive(Debug, Clone)]
pub struct TestRunOutcome {
    pub test_id: TestId,
    pub passed: bool,
    pub failures: Vec<String>,
}

/// Outcome of executing a snippet directly.
#[derive(Debug, Clone)]
pub struct SnippetRunOutcome {
    pub success: bool,
    pub output: String,
}

// ---------------------------------------------------------------------------
// Read-side views
// ---------------------------------------------------------------------------

/// One decoded audit log with its attached attributes.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub tag: AuditTag,
    pub snippet_id: Option<SnippetId>,
    pub test_id: Option<TestId>,
    pub recorded_at: DateTime<Utc>,
    pub details: AuditDetails,
}

/// Latest-status projection for one (entity, tag) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub status: AuditStatus,
    pub recorded_at: Option<DateTime<Utc>>,
    pub issues: Vec<CodeIssue>,
}

impl StatusView {
    /// Sentinel returned when an entity has no audit history yet. Callers
    /// cannot distinguish "never processed" from "processing in progress".
    pub fn pending() -> Self {
        Self {
            status: AuditStatus::Pending,
            recorded_at: None,
            issues: Vec::new(),
        }
    }
}

/// One decoded test-execution run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub test_id: TestId,
    pub status: AuditStatus,
    pub failures: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_display_and_parse_agree() {
        for tag in AuditTag::ALL {
            let parsed: AuditTag = tag.to_string().parse().unwrap();
            assert_eq!(parsed, tag);
        }
        assert!("compilation".parse::<AuditTag>().is_err());
    }

    #[test]
    fn pending_sentinel_carries_no_history() {
        let view = StatusView::pending();
        assert_eq!(view.status, AuditStatus::Pending);
        assert!(view.recorded_at.is_none());
        assert!(view.issues.is_empty());
    }

    #[test]
    fn details_expose_tag_and_status() {
        let details = AuditDetails::Lint {
            status: AuditStatus::Invalid,
            issues: vec![CodeIssue {
                message: "unused variable".into(),
                rule: Some("no-unused".into()),
                line: Some(3),
                column: Some(7),
            }],
        };
        assert_eq!(details.tag(), AuditTag::Lint);
        assert_eq!(details.status(), AuditStatus::Invalid);
        assert_eq!(details.issues().len(), 1);
    }
}
