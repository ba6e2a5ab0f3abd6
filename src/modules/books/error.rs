use serde::Serialize;
use thiserror::Error;

use super::messages;
use super::repository::RepoError;

pub type BookResult<T> = Result<T, BookError>;

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub error: &'static str,
}

impl FieldViolation {
    pub fn new(field: &'static str, error: &'static str) -> Self {
        Self { field, error }
    }
}

/// Failures of the book workflow.
#[derive(Debug, Error)]
pub enum BookError {
    /// A referenced book or publisher does not exist.
    #[error("{0}")]
    NotFound(&'static str),

    #[error("{message}")]
    InvalidInput {
        message: String,
        details: Vec<FieldViolation>,
    },

    /// A unique column already holds the submitted value.
    #[error("{0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(#[source] RepoError),
}

impl BookError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn invalid_fields(details: Vec<FieldViolation>) -> Self {
        Self::InvalidInput {
            message: messages::INVALID_BOOK_REQUEST.to_string(),
            details,
        }
    }
}

impl From<RepoError> for BookError {
    fn from(err: RepoError) -> Self {
        match err.unique_violation() {
            Some(constraint) => BookError::Conflict(constraint.to_string()),
            None => BookError::Storage(err),
        }
    }
}

impl From<sqlx::Error> for BookError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::from(err).into()
    }
}
