//! Repository contracts and their SQLite implementations.
//!
//! Every method takes the caller's connection, normally the connection of an
//! open transaction, so one workflow step can span several repositories and
//! still commit or roll back as a unit.
//!
//! Saves are upserts keyed on the entity id. A book save never deletes its
//! row, so the `ON DELETE CASCADE` on the deposit and author links only fires
//! on an explicit delete.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use thiserror::Error;

use super::models::{
    Author, AuthorId, Book, BookId, LegalDeposit, LegalDepositId, Publisher, PublisherId,
};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RepoError {
    /// Database message when the failure is a unique-constraint violation.
    pub fn unique_violation(&self) -> Option<&str> {
        match self {
            RepoError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Some(db.message())
            }
            _ => None,
        }
    }
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn find_by_id(&self, conn: &mut SqliteConnection, id: BookId)
        -> RepoResult<Option<Book>>;
    /// Every book in storage order.
    async fn find_all(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<Book>>;
    async fn exists_by_id(&self, conn: &mut SqliteConnection, id: BookId) -> RepoResult<bool>;
    /// Insert or update by id, replacing the author links.
    async fn save(&self, conn: &mut SqliteConnection, book: &Book) -> RepoResult<Book>;
    /// Returns whether a row was removed.
    async fn delete_by_id(&self, conn: &mut SqliteConnection, id: BookId) -> RepoResult<bool>;
}

#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: AuthorId,
    ) -> RepoResult<Option<Author>>;
    /// Authors matching `ids`; unknown ids are silently omitted.
    async fn find_all_by_id(
        &self,
        conn: &mut SqliteConnection,
        ids: &BTreeSet<AuthorId>,
    ) -> RepoResult<Vec<Author>>;
    async fn find_all(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<Author>>;
    async fn save(&self, conn: &mut SqliteConnection, author: &Author) -> RepoResult<Author>;
}

#[async_trait]
pub trait PublisherRepository: Send + Sync {
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: PublisherId,
    ) -> RepoResult<Option<Publisher>>;
    async fn find_all(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<Publisher>>;
    async fn exists_by_id(&self, conn: &mut SqliteConnection, id: PublisherId)
        -> RepoResult<bool>;
    async fn save(
        &self,
        conn: &mut SqliteConnection,
        publisher: &Publisher,
    ) -> RepoResult<Publisher>;
}

#[async_trait]
pub trait LegalDepositRepository: Send + Sync {
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: LegalDepositId,
    ) -> RepoResult<Option<LegalDeposit>>;
    async fn find_by_book_id(
        &self,
        conn: &mut SqliteConnection,
        book_id: BookId,
    ) -> RepoResult<Option<LegalDeposit>>;
    async fn find_all(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<LegalDeposit>>;
    async fn save(
        &self,
        conn: &mut SqliteConnection,
        deposit: &LegalDeposit,
    ) -> RepoResult<LegalDeposit>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteBookRepository;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteAuthorRepository;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlitePublisherRepository;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteLegalDepositRepository;

#[derive(FromRow)]
struct BookRow {
    id: BookId,
    title: String,
    isbn: String,
    pages: u32,
    language: String,
    publisher_id: Option<PublisherId>,
    legal_deposit_id: Option<LegalDepositId>,
}

impl BookRow {
    fn into_book(self, author_ids: BTreeSet<AuthorId>) -> Book {
        Book {
            id: self.id,
            title: self.title,
            isbn: self.isbn,
            pages: self.pages,
            language: self.language,
            publisher_id: self.publisher_id,
            author_ids,
            legal_deposit_id: self.legal_deposit_id,
        }
    }
}

const SELECT_BOOK_BY_ID: &str = "
    SELECT b.id, b.title, b.isbn, b.pages, b.language, b.publisher_id,
           d.id AS legal_deposit_id
    FROM tb_book b
    LEFT JOIN tb_legal_deposit d ON d.book_id = b.id
    WHERE b.id = ?";

const SELECT_ALL_BOOKS: &str = "
    SELECT b.id, b.title, b.isbn, b.pages, b.language, b.publisher_id,
           d.id AS legal_deposit_id
    FROM tb_book b
    LEFT JOIN tb_legal_deposit d ON d.book_id = b.id";

const UPSERT_BOOK: &str = "
    INSERT INTO tb_book (id, title, isbn, pages, language, publisher_id)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT (id) DO UPDATE SET
        title = excluded.title,
        isbn = excluded.isbn,
        pages = excluded.pages,
        language = excluded.language,
        publisher_id = excluded.publisher_id";

async fn load_author_ids(
    conn: &mut SqliteConnection,
    book_id: BookId,
) -> RepoResult<BTreeSet<AuthorId>> {
    let ids: Vec<AuthorId> =
        sqlx::query_scalar("SELECT author_id FROM tb_book_author WHERE book_id = ?")
            .bind(book_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(ids.into_iter().collect())
}

#[async_trait]
impl BookRepository for SqliteBookRepository {
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: BookId,
    ) -> RepoResult<Option<Book>> {
        let row: Option<BookRow> = sqlx::query_as(SELECT_BOOK_BY_ID)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let author_ids = load_author_ids(conn, row.id).await?;
                Ok(Some(row.into_book(author_ids)))
            }
            None => Ok(None),
        }
    }

    async fn find_all(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<Book>> {
        let rows: Vec<BookRow> = sqlx::query_as(SELECT_ALL_BOOKS)
            .fetch_all(&mut *conn)
            .await?;

        let links: Vec<(BookId, AuthorId)> =
            sqlx::query_as("SELECT book_id, author_id FROM tb_book_author")
                .fetch_all(&mut *conn)
                .await?;
        let mut authors_by_book: HashMap<BookId, BTreeSet<AuthorId>> = HashMap::new();
        for (book_id, author_id) in links {
            authors_by_book.entry(book_id).or_default().insert(author_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let author_ids = authors_by_book.remove(&row.id).unwrap_or_default();
                row.into_book(author_ids)
            })
            .collect())
    }

    async fn exists_by_id(&self, conn: &mut SqliteConnection, id: BookId) -> RepoResult<bool> {
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tb_book WHERE id = ?)")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(exists == 1)
    }

    async fn save(&self, conn: &mut SqliteConnection, book: &Book) -> RepoResult<Book> {
        sqlx::query(UPSERT_BOOK)
            .bind(book.id)
            .bind(book.title.as_str())
            .bind(book.isbn.as_str())
            .bind(book.pages)
            .bind(book.language.as_str())
            .bind(book.publisher_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query("DELETE FROM tb_book_author WHERE book_id = ?")
            .bind(book.id)
            .execute(&mut *conn)
            .await?;
        for author_id in &book.author_ids {
            sqlx::query("INSERT INTO tb_book_author (book_id, author_id) VALUES (?, ?)")
                .bind(book.id)
                .bind(*author_id)
                .execute(&mut *conn)
                .await?;
        }

        Ok(book.clone())
    }

    async fn delete_by_id(&self, conn: &mut SqliteConnection, id: BookId) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM tb_book WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AuthorRepository for SqliteAuthorRepository {
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: AuthorId,
    ) -> RepoResult<Option<Author>> {
        let author = sqlx::query_as("SELECT id, name, nationality FROM tb_author WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(author)
    }

    async fn find_all_by_id(
        &self,
        conn: &mut SqliteConnection,
        ids: &BTreeSet<AuthorId>,
    ) -> RepoResult<Vec<Author>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, name, nationality FROM tb_author WHERE id IN (",
        );
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let authors = query
            .build_query_as::<Author>()
            .fetch_all(&mut *conn)
            .await?;
        Ok(authors)
    }

    async fn find_all(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<Author>> {
        let authors = sqlx::query_as("SELECT id, name, nationality FROM tb_author ORDER BY name")
            .fetch_all(&mut *conn)
            .await?;
        Ok(authors)
    }

    async fn save(&self, conn: &mut SqliteConnection, author: &Author) -> RepoResult<Author> {
        sqlx::query(
            "INSERT INTO tb_author (id, name, nationality) VALUES (?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                nationality = excluded.nationality",
        )
        .bind(author.id)
        .bind(author.name.as_str())
        .bind(author.nationality.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(author.clone())
    }
}

#[async_trait]
impl PublisherRepository for SqlitePublisherRepository {
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: PublisherId,
    ) -> RepoResult<Option<Publisher>> {
        let publisher = sqlx::query_as("SELECT id, name FROM tb_publisher WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(publisher)
    }

    async fn find_all(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<Publisher>> {
        let publishers = sqlx::query_as("SELECT id, name FROM tb_publisher ORDER BY name")
            .fetch_all(&mut *conn)
            .await?;
        Ok(publishers)
    }

    async fn exists_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: PublisherId,
    ) -> RepoResult<bool> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tb_publisher WHERE id = ?)")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(exists == 1)
    }

    async fn save(
        &self,
        conn: &mut SqliteConnection,
        publisher: &Publisher,
    ) -> RepoResult<Publisher> {
        sqlx::query(
            "INSERT INTO tb_publisher (id, name) VALUES (?, ?)
             ON CONFLICT (id) DO UPDATE SET name = excluded.name",
        )
        .bind(publisher.id)
        .bind(publisher.name.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(publisher.clone())
    }
}

#[async_trait]
impl LegalDepositRepository for SqliteLegalDepositRepository {
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: LegalDepositId,
    ) -> RepoResult<Option<LegalDeposit>> {
        let deposit = sqlx::query_as(
            "SELECT id, book_id, deposit_code, country FROM tb_legal_deposit WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(deposit)
    }

    async fn find_by_book_id(
        &self,
        conn: &mut SqliteConnection,
        book_id: BookId,
    ) -> RepoResult<Option<LegalDeposit>> {
        let deposit = sqlx::query_as(
            "SELECT id, book_id, deposit_code, country FROM tb_legal_deposit WHERE book_id = ?",
        )
        .bind(book_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(deposit)
    }

    async fn find_all(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<LegalDeposit>> {
        let deposits =
            sqlx::query_as("SELECT id, book_id, deposit_code, country FROM tb_legal_deposit")
                .fetch_all(&mut *conn)
                .await?;
        Ok(deposits)
    }

    async fn save(
        &self,
        conn: &mut SqliteConnection,
        deposit: &LegalDeposit,
    ) -> RepoResult<LegalDeposit> {
        sqlx::query(
            "INSERT INTO tb_legal_deposit (id, book_id, deposit_code, country) VALUES (?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                book_id = excluded.book_id,
                deposit_code = excluded.deposit_code,
                country = excluded.country",
        )
        .bind(deposit.id)
        .bind(deposit.book_id)
        .bind(deposit.deposit_code.as_str())
        .bind(deposit.country())
        .execute(&mut *conn)
        .await?;
        Ok(deposit.clone())
    }
}
