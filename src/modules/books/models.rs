//! Persisted entities of the bookstore catalog.
//!
//! Relations are stored as ids, never as live references: a `Book` knows its
//! publisher, author and legal-deposit ids, and the other side is resolved
//! through the repositories.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub type BookId = Uuid;
pub type AuthorId = Uuid;
pub type PublisherId = Uuid;
pub type LegalDepositId = Uuid;

/// A catalog book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    /// Unique across the catalog.
    pub title: String,
    /// Unique across the catalog.
    pub isbn: String,
    pub pages: u32,
    /// Unique across the catalog.
    pub language: String,
    pub publisher_id: Option<PublisherId>,
    pub author_ids: BTreeSet<AuthorId>,
    /// Owned deposit record; the deposit row carries the foreign key.
    pub legal_deposit_id: Option<LegalDepositId>,
}

impl Book {
    /// New unsaved book without a legal deposit.
    pub fn new(
        title: impl Into<String>,
        isbn: impl Into<String>,
        pages: u32,
        language: impl Into<String>,
        publisher_id: PublisherId,
        author_ids: BTreeSet<AuthorId>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            isbn: isbn.into(),
            pages,
            language: language.into(),
            publisher_id: Some(publisher_id),
            author_ids,
            legal_deposit_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
    pub nationality: String,
}

impl Author {
    pub fn new(name: impl Into<String>, nationality: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            nationality: nationality.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Publisher {
    pub id: PublisherId,
    pub name: String,
}

impl Publisher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
        }
    }
}

/// Registration of a book with a national deposit authority.
///
/// The country code is always held uppercase.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct LegalDeposit {
    pub id: LegalDepositId,
    pub book_id: BookId,
    pub deposit_code: String,
    country: String,
}

impl LegalDeposit {
    pub fn new(book_id: BookId, deposit_code: impl Into<String>, country: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            book_id,
            deposit_code: deposit_code.into(),
            country: normalize_country(country),
        }
    }

    /// Replace code and country, keeping this deposit's identity.
    pub fn register(&mut self, deposit_code: impl Into<String>, country: &str) {
        self.deposit_code = deposit_code.into();
        self.country = normalize_country(country);
    }

    pub fn country(&self) -> &str {
        &self.country
    }
}

/// Locale-independent uppercase; the code itself is stored as submitted.
pub fn normalize_country(country: &str) -> String {
    country.to_uppercase()
}
