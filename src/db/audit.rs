//! Audit trail persistence: logs, their attribute rows, and typed decode.
//!
//! The flat name/value attribute convention lives entirely in this adapter.
//! Repeated issues flatten to `error_{n}_message` / `error_{n}_rule` /
//! `error_{n}_line` / `error_{n}_column` (0-based, dense) on the way in and
//! are rebuilt by probing sequential indices on the way out. Decoding is
//! versionless and tolerant: absent optional attributes become None/empty,
//! unknown attribute names are ignored.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use uuid::Uuid;

use crate::audit::AuditTrail;
use crate::error::{Error, Result};
use crate::model::audit::{
    AuditDetails, AuditEntry, AuditStatus, AuditTag, CodeIssue, ExecutionResult, FormatOutcome,
    LintOutcome, SnippetRunOutcome, StatusView, TestRunOutcome, ValidationOutcome,
};
use crate::model::job::{SnippetId, TestId};
use crate::telemetry::metrics;

use super::Db;

// ---------------------------------------------------------------------------
// Attribute codec
// ---------------------------------------------------------------------------

pub(crate) fn encode_details(details: &AuditDetails) -> Vec<(String, String)> {
    let mut fields = vec![("status".to_string(), details.status().to_string())];

    match details {
        AuditDetails::Validation { issues, .. } | AuditDetails::Lint { issues, .. } => {
            for (n, issue) in issues.iter().enumerate() {
                fields.push((format!("error_{n}_message"), issue.message.clone()));
                if let Some(ref rule) = issue.rule {
                    fields.push((format!("error_{n}_rule"), rule.clone()));
                }
                if let Some(line) = issue.line {
                    fields.push((format!("error_{n}_line"), line.to_string()));
                }
                if let Some(column) = issue.column {
                    fields.push((format!("error_{n}_column"), column.to_string()));
                }
            }
        }
        AuditDetails::Format { formatted_code, .. } => {
            if let Some(code) = formatted_code {
                fields.push(("formatted_code".to_string(), code.clone()));
            }
        }
        AuditDetails::TestExecution { failures, .. } => {
            for (n, failure) in failures.iter().enumerate() {
                fields.push((format!("error_{n}_message"), failure.clone()));
            }
        }
        AuditDetails::SnippetExecution { output, .. } => {
            if let Some(out) = output {
                fields.push(("output".to_string(), out.clone()));
            }
        }
    }

    fields
}

pub(crate) fn decode_details(tag: AuditTag, fields: &[(String, String)]) -> AuditDetails {
    let status = decode_status(fields);
    match tag {
        AuditTag::Validation => AuditDetails::Validation {
            status,
            issues: decode_issues(fields),
        },
        AuditTag::Lint => AuditDetails::Lint {
            status,
            issues: decode_issues(fields),
        },
        AuditTag::Format => AuditDetails::Format {
            status,
            formatted_code: field(fields, "formatted_code").map(str::to_string),
        },
        AuditTag::TestExecution => AuditDetails::TestExecution {
            status,
            failures: decode_failures(fields),
        },
        AuditTag::SnippetExecution => AuditDetails::SnippetExecution {
            status,
            output: field(fields, "output").map(str::to_string),
        },
    }
}

fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// A log whose status attribute is missing or unreadable decodes as Error;
/// Pending is reserved for the no-log-at-all sentinel.
fn decode_status(fields: &[(String, String)]) -> AuditStatus {
    field(fields, "status")
        .and_then(|s| s.parse().ok())
        .unwrap_or(AuditStatus::Error)
}

fn decode_issues(fields: &[(String, String)]) -> Vec<CodeIssue> {
    let mut issues = Vec::new();
    for n in 0.. {
        let Some(message) = field(fields, &format!("error_{n}_message")) else {
            break;
        };
        issues.push(CodeIssue {
            message: message.to_string(),
            rule: field(fields, &format!("error_{n}_rule")).map(str::to_string),
            line: field(fields, &format!("error_{n}_line")).and_then(|v| v.parse().ok()),
            column: field(fields, &format!("error_{n}_column")).and_then(|v| v.parse().ok()),
        });
    }
    issues
}

fn decode_failures(fields: &[(String, String)]) -> Vec<String> {
    let mut failures = Vec::new();
    for n in 0.. {
        let Some(message) = field(fields, &format!("error_{n}_message")) else {
            break;
        };
        failures.push(message.to_string());
    }
    failures
}

// ---------------------------------------------------------------------------
// Row shapes
// ---------------------------------------------------------------------------

type LogRow = (Uuid, String, Option<String>, Option<String>, DateTime<Utc>);

fn row_to_entry(row: LogRow, fields: &[(String, String)]) -> Result<AuditEntry> {
    let (id, tag_name, snippet_id, test_id, recorded_at) = row;
    let tag: AuditTag = tag_name.parse()?;
    Ok(AuditEntry {
        id,
        tag,
        snippet_id: snippet_id.map(SnippetId::parse).transpose()?,
        test_id: test_id.map(TestId::new),
        recorded_at,
        details: decode_details(tag, fields),
    })
}

// ---------------------------------------------------------------------------
// Write path
// ---------------------------------------------------------------------------

impl Db {
    /// Append one log plus its attribute rows in a single transaction: either
    /// both become visible to readers or neither does.
    async fn append_entry(
        &self,
        tag: AuditTag,
        snippet_id: Option<&SnippetId>,
        test_id: Option<&TestId>,
        details: &AuditDetails,
    ) -> Result<Uuid> {
        let mut tx = self.pool().begin().await?;

        let tag_row: Option<(i32,)> = sqlx::query_as("SELECT id FROM audit_tags WHERE name = $1")
            .bind(tag.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let tag_id = tag_row.ok_or_else(|| Error::TagNotSeeded(tag.to_string()))?.0;

        let log_id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO audit_logs (id, tag_id, snippet_id, test_id, recorded_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(log_id)
        .bind(tag_id)
        .bind(snippet_id.map(SnippetId::as_str))
        .bind(test_id.map(TestId::as_str))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (name, value) in encode_details(details) {
            sqlx::query("INSERT INTO audit_log_data (id, log_id, name, value) VALUES ($1, $2, $3, $4)")
                .bind(Uuid::new_v4())
                .bind(log_id)
                .bind(name)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        metrics::audit_writes().add(1, &[KeyValue::new("tag", tag.as_str())]);
        Ok(log_id)
    }

    /// Fetch log rows for an entity plus their attribute rows, newest first.
    async fn fetch_entries(
        &self,
        entity: &str,
        tag: Option<AuditTag>,
    ) -> Result<Vec<(LogRow, Vec<(String, String)>)>> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT l.id, t.name, l.snippet_id, l.test_id, l.recorded_at
             FROM audit_logs l
             JOIN audit_tags t ON t.id = l.tag_id
             WHERE (l.snippet_id = $1 OR l.test_id = $1)
               AND ($2::text IS NULL OR t.name = $2)
             ORDER BY l.recorded_at DESC, l.id DESC",
        )
        .bind(entity)
        .bind(tag.map(AuditTag::as_str))
        .fetch_all(self.pool())
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.0).collect();
        let data: Vec<(Uuid, String, String)> = sqlx::query_as(
            "SELECT log_id, name, value FROM audit_log_data WHERE log_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await?;

        let mut by_log: HashMap<Uuid, Vec<(String, String)>> = HashMap::new();
        for (log_id, name, value) in data {
            by_log.entry(log_id).or_default().push((name, value));
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let fields = by_log.remove(&row.0).unwrap_or_default();
                (row, fields)
            })
            .collect())
    }
}

#[async_trait]
impl AuditTrail for Db {
    async fn record_validation(
        &self,
        snippet: &SnippetId,
        outcome: ValidationOutcome,
    ) -> Result<()> {
        let details = AuditDetails::Validation {
            status: if outcome.valid {
                AuditStatus::Valid
            } else {
                AuditStatus::Invalid
            },
            issues: outcome.issues,
        };
        self.append_entry(AuditTag::Validation, Some(snippet), None, &details)
            .await?;
        Ok(())
    }

    async fn record_lint(&self, snippet: &SnippetId, outcome: LintOutcome) -> Result<()> {
        let details = AuditDetails::Lint {
            status: if outcome.valid {
                AuditStatus::Valid
            } else {
                AuditStatus::Invalid
            },
            issues: outcome.issues,
        };
        self.append_entry(AuditTag::Lint, Some(snippet), None, &details)
            .await?;
        Ok(())
    }

    async fn record_format(&self, snippet: &SnippetId, outcome: FormatOutcome) -> Result<()> {
        let details = AuditDetails::Format {
            status: AuditStatus::Success,
            formatted_code: Some(outcome.formatted_code),
        };
        self.append_entry(AuditTag::Format, Some(snippet), None, &details)
            .await?;
        Ok(())
    }

    async fn record_test_execution(&self, outcome: TestRunOutcome) -> Result<()> {
        let details = AuditDetails::TestExecution {
            status: if outcome.passed {
                AuditStatus::Passed
            } else {
                AuditStatus::Failed
            },
            failures: outcome.failures,
        };
        self.append_entry(AuditTag::TestExecution, None, Some(&outcome.test_id), &details)
            .await?;
        Ok(())
    }

    async fn record_snippet_execution(
        &self,
        snippet: &SnippetId,
        outcome: SnippetRunOutcome,
    ) -> Result<()> {
        let details = AuditDetails::SnippetExecution {
            status: if outcome.success {
                AuditStatus::Success
            } else {
                AuditStatus::Error
            },
            output: Some(outcome.output),
        };
        self.append_entry(AuditTag::SnippetExecution, Some(snippet), None, &details)
            .await?;
        Ok(())
    }

    async fn entries(&self, entity: &str, tag: Option<AuditTag>) -> Result<Vec<AuditEntry>> {
        self.fetch_entries(entity, tag)
            .await?
            .into_iter()
            .map(|(row, fields)| row_to_entry(row, &fields))
            .collect()
    }

    async fn latest_status(&self, entity: &str, tag: AuditTag) -> Result<StatusView> {
        let mut entries = self.fetch_entries(entity, Some(tag)).await?;
        if entries.is_empty() {
            return Ok(StatusView::pending());
        }
        let (row, fields) = entries.remove(0);
        let entry = row_to_entry(row, &fields)?;
        Ok(StatusView {
            status: entry.details.status(),
            recorded_at: Some(entry.recorded_at),
            issues: entry.details.issues().to_vec(),
        })
    }

    async fn execution_history(&self, test: &TestId) -> Result<Vec<ExecutionResult>> {
        let entries = self
            .entries(test.as_str(), Some(AuditTag::TestExecution))
            .await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let failures = match entry.details {
                    AuditDetails::TestExecution { ref failures, .. } => failures.clone(),
                    _ => Vec::new(),
                };
                ExecutionResult {
                    test_id: entry.test_id.unwrap_or_else(|| test.clone()),
                    status: entry.details.status(),
                    failures,
                    recorded_at: entry.recorded_at,
                }
            })
            .collect())
    }

    async fn formatted_version(&self, snippet: &SnippetId) -> Result<Option<String>> {
        let mut entries = self
            .fetch_entries(snippet.as_str(), Some(AuditTag::Format))
            .await?;
        if entries.is_empty() {
            return Ok(None);
        }
        let (row, fields) = entries.remove(0);
        match row_to_entry(row, &fields)?.details {
            AuditDetails::Format { formatted_code, .. } => Ok(formatted_code),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(message: &str, rule: &str, line: u32, column: u32) -> CodeIssue {
        CodeIssue {
            message: message.to_string(),
            rule: Some(rule.to_string()),
            line: Some(line),
            column: Some(column),
        }
    }

    #[test]
    fn lint_issues_round_trip_in_order() {
        let details = AuditDetails::Lint {
            status: AuditStatus::Invalid,
            issues: vec![
                issue("missing semicolon", "semi", 1, 14),
                issue("unused variable", "no-unused", 3, 5),
                issue("shadowed binding", "no-shadow", 9, 2),
            ],
        };

        let decoded = decode_details(AuditTag::Lint, &encode_details(&details));
        assert_eq!(decoded, details);
    }

    #[test]
    fn issue_decode_probes_until_first_absent_index() {
        // error_1_* is missing: only the dense prefix survives
        let fields = vec![
            ("status".to_string(), "invalid".to_string()),
            ("error_0_message".to_string(), "first".to_string()),
            ("error_2_message".to_string(), "orphaned".to_string()),
        ];
        let decoded = decode_details(AuditTag::Lint, &fields);
        match decoded {
            AuditDetails::Lint { issues, .. } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].message, "first");
            }
            other => panic!("expected Lint, got {other:?}"),
        }
    }

    #[test]
    fn absent_optional_issue_fields_decode_as_none() {
        let fields = vec![
            ("status".to_string(), "invalid".to_string()),
            ("error_0_message".to_string(), "type mismatch".to_string()),
        ];
        let decoded = decode_details(AuditTag::Validation, &fields);
        match decoded {
            AuditDetails::Validation { issues, .. } => {
                assert_eq!(issues[0].rule, None);
                assert_eq!(issues[0].line, None);
                assert_eq!(issues[0].column, None);
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn unknown_attribute_names_are_ignored() {
        let fields = vec![
            ("status".to_string(), "success".to_string()),
            ("formatted_code".to_string(), "let x = 1;".to_string()),
            ("added_by_v2".to_string(), "whatever".to_string()),
        ];
        let decoded = decode_details(AuditTag::Format, &fields);
        assert_eq!(
            decoded,
            AuditDetails::Format {
                status: AuditStatus::Success,
                formatted_code: Some("let x = 1;".to_string()),
            }
        );
    }

    #[test]
    fn missing_status_decodes_as_error_not_pending() {
        let decoded = decode_details(AuditTag::Format, &[]);
        assert_eq!(decoded.status(), AuditStatus::Error);
    }

    #[test]
    fn test_execution_failures_round_trip() {
        let details = AuditDetails::TestExecution {
            status: AuditStatus::Failed,
            failures: vec![
                "expected 5, got 4".to_string(),
                "timeout after 1000ms".to_string(),
            ],
        };
        let decoded = decode_details(AuditTag::TestExecution, &encode_details(&details));
        assert_eq!(decoded, details);
    }

    #[test]
    fn snippet_execution_output_round_trips() {
        let details = AuditDetails::SnippetExecution {
            status: AuditStatus::Success,
            output: Some("42\n".to_string()),
        };
        let decoded = decode_details(AuditTag::SnippetExecution, &encode_details(&details));
        assert_eq!(decoded, details);
    }
}
