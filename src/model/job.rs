//! Typed job requests.
//!
//! A job request is the immutable record a producer serializes onto the
//! stream and a consumer decodes back. The wire form is JSON; unknown fields
//! are ignored on decode so older consumers survive newer producers.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Snippet identifier. Construction via [`SnippetId::parse`] enforces the
/// platform's identifier syntax; decoding from the wire does not re-validate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnippetId(String);

impl SnippetId {
    /// Parse an identifier, rejecting empty strings and characters outside
    /// `[A-Za-z0-9_-]`.
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        let valid = !s.is_empty()
            && s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if valid {
            Ok(Self(s))
        } else {
            Err(Error::InvalidSnippetId(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnippetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// User identifier, opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Test case identifier, opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(String);

impl TestId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Job kind
// ---------------------------------------------------------------------------

/// The three asynchronous processing jobs. Each kind has its own topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Format,
    Lint,
    TestExecution,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Format, JobKind::Lint, JobKind::TestExecution];

    /// Format and test execution run against a specific user's rule
    /// configuration; lint runs against the snippet owner's.
    pub fn requires_user(self) -> bool {
        matches!(self, JobKind::Format | JobKind::TestExecution)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobKind::Format => "format",
            JobKind::Lint => "lint",
            JobKind::TestExecution => "test_execution",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "format" => Ok(JobKind::Format),
            "lint" => Ok(JobKind::Lint),
            "test_execution" => Ok(JobKind::TestExecution),
            _ => Err(Error::Other(format!("unknown job kind: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Job request
// ---------------------------------------------------------------------------

/// One unit of background work, as serialized onto the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub snippet_id: SnippetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub kind: JobKind,
}

impl JobRequest {
    /// Serialize for the stream.
    pub fn encode(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a record received from the stream.
    pub fn decode(value: &serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}
