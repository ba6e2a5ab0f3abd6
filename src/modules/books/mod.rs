pub mod dto;
pub mod error;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookstore_db::Database;
use bookstore_kernel::{InitCtx, Migration, Module};
use utoipa::OpenApi;

use service::BookService;

/// Client-facing messages of the books module.
pub mod messages {
    pub const BOOK_NOT_FOUND: &str = "Book not found";
    pub const PUBLISHER_NOT_FOUND: &str = "Publisher not found";
    pub const AT_LEAST_ONE_AUTHOR_REQUIRED: &str = "At least one author is required";
    pub const BOOK_DELETE_SUCCESSFULLY: &str = "Book delete successfully!";
    pub const INVALID_BOOK_REQUEST: &str = "Invalid book request";
    pub const BOOK_CONFLICT: &str = "Book conflicts with an existing record";
}

/// Book catalog module with publishers, authors and legal deposits
pub struct BooksModule {
    service: Arc<BookService>,
}

impl BooksModule {
    pub fn new(service: Arc<BookService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(Arc::clone(&self.service))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        match serde_json::to_value(routes::BooksApi::openapi()) {
            Ok(doc) => Some(doc),
            Err(err) => {
                tracing::warn!(
                    module = self.name(),
                    error = %err,
                    "books OpenAPI document not serializable"
                );
                None
            }
        }
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Schema of the books module.
///
/// `language` and `country` carry UNIQUE constraints: two books cannot share
/// a language and two deposits cannot share a country.
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE tb_publisher (
                id   BLOB PRIMARY KEY NOT NULL,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE tb_author (
                id          BLOB PRIMARY KEY NOT NULL,
                name        TEXT NOT NULL UNIQUE,
                nationality TEXT NOT NULL
            );

            CREATE TABLE tb_book (
                id           BLOB PRIMARY KEY NOT NULL,
                title        TEXT NOT NULL UNIQUE,
                isbn         TEXT NOT NULL UNIQUE,
                pages        INTEGER NOT NULL CHECK (pages > 0),
                language     TEXT NOT NULL UNIQUE,
                publisher_id BLOB REFERENCES tb_publisher (id)
            );

            CREATE TABLE tb_book_author (
                book_id   BLOB NOT NULL REFERENCES tb_book (id) ON DELETE CASCADE,
                author_id BLOB NOT NULL REFERENCES tb_author (id),
                PRIMARY KEY (book_id, author_id)
            );
            CREATE INDEX idx_book_author_author ON tb_book_author (author_id);

            CREATE TABLE tb_legal_deposit (
                id           BLOB PRIMARY KEY NOT NULL,
                book_id      BLOB NOT NULL UNIQUE REFERENCES tb_book (id) ON DELETE CASCADE,
                deposit_code TEXT NOT NULL UNIQUE,
                country      TEXT NOT NULL UNIQUE
            );
        "#,
    }]
}

/// Create the books module backed by `db`
pub fn create_module(db: Database) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(Arc::new(BookService::sqlite(db))))
}
