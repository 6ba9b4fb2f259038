//! Error types for snipq.

use thiserror::Error;

use crate::model::job::JobKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid snippet id: {0:?}")]
    InvalidSnippetId(String),

    #[error("{0} jobs require a user id")]
    UserRequired(JobKind),

    #[error("{0} jobs do not carry a user id")]
    UserForbidden(JobKind),

    #[error("malformed record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("audit tag not seeded: {0}")]
    TagNotSeeded(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
