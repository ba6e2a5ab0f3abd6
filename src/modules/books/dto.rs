//! Wire shapes for the books API and their mapping to entities.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::{BookError, FieldViolation};
use super::models::{Book, LegalDeposit};
use crate::utils::is_blank;

/// Body of create and update requests.
///
/// Missing text fields deserialize as empty so that [`BookRequest::validate`]
/// reports them alongside every other violation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    /// Ignored; the path decides which book is written.
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub pages: i64,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub publisher_id: Option<Uuid>,
    #[serde(default)]
    pub author_ids: BTreeSet<Uuid>,
    #[serde(default)]
    pub deposit_code_registration: String,
    #[serde(default)]
    pub country: String,
}

/// A request that passed field validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub isbn: String,
    pub pages: u32,
    pub language: String,
    pub publisher_id: Uuid,
    pub author_ids: BTreeSet<Uuid>,
    pub deposit_code: String,
    pub country: String,
}

impl BookRequest {
    /// Check field shape before anything touches the store.
    ///
    /// Author ids are not checked here: an empty or unknown set is rejected
    /// by the workflow once the ids have been looked up.
    pub fn validate(self) -> Result<BookDraft, BookError> {
        let mut violations = Vec::new();

        for (field, value) in [
            ("title", &self.title),
            ("isbn", &self.isbn),
            ("language", &self.language),
            ("depositCodeRegistration", &self.deposit_code_registration),
            ("country", &self.country),
        ] {
            if is_blank(value) {
                violations.push(FieldViolation::new(field, "must not be blank"));
            }
        }

        let pages = u32::try_from(self.pages).ok().filter(|pages| *pages > 0);
        if pages.is_none() {
            violations.push(FieldViolation::new("pages", "must be a positive integer"));
        }
        if self.publisher_id.is_none() {
            violations.push(FieldViolation::new("publisherId", "is required"));
        }

        match (pages, self.publisher_id) {
            (Some(pages), Some(publisher_id)) if violations.is_empty() => Ok(BookDraft {
                title: self.title,
                isbn: self.isbn,
                pages,
                language: self.language,
                publisher_id,
                author_ids: self.author_ids,
                deposit_code: self.deposit_code_registration,
                country: self.country,
            }),
            _ => Err(BookError::invalid_fields(violations)),
        }
    }
}

/// Book as returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub isbn: String,
    pub pages: u32,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<Uuid>,
    pub author_ids: BTreeSet<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_code: Option<String>,
}

impl BookResponse {
    pub fn new(book: &Book, deposit: Option<&LegalDeposit>) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            isbn: book.isbn.clone(),
            pages: book.pages,
            language: book.language.clone(),
            publisher_id: book.publisher_id,
            author_ids: book.author_ids.clone(),
            deposit_code: deposit.map(|deposit| deposit.deposit_code.clone()),
        }
    }
}
