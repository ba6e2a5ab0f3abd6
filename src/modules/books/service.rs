//! Book workflow: every operation is one transaction over the repositories.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bookstore_db::Database;
use sqlx::SqliteConnection;

use super::dto::{BookRequest, BookResponse};
use super::error::{BookError, BookResult};
use super::messages;
use super::models::{AuthorId, Book, BookId, LegalDeposit, PublisherId};
use super::repository::{
    AuthorRepository, BookRepository, LegalDepositRepository, PublisherRepository,
    SqliteAuthorRepository, SqliteBookRepository, SqliteLegalDepositRepository,
    SqlitePublisherRepository,
};

/// Create, read, update and delete books together with their legal deposit.
pub struct BookService {
    db: Database,
    books: Arc<dyn BookRepository>,
    authors: Arc<dyn AuthorRepository>,
    publishers: Arc<dyn PublisherRepository>,
    deposits: Arc<dyn LegalDepositRepository>,
}

impl BookService {
    pub fn new(
        db: Database,
        books: Arc<dyn BookRepository>,
        authors: Arc<dyn AuthorRepository>,
        publishers: Arc<dyn PublisherRepository>,
        deposits: Arc<dyn LegalDepositRepository>,
    ) -> Self {
        Self {
            db,
            books,
            authors,
            publishers,
            deposits,
        }
    }

    /// Service wired to the SQLite repositories.
    pub fn sqlite(db: Database) -> Self {
        Self::new(
            db,
            Arc::new(SqliteBookRepository),
            Arc::new(SqliteAuthorRepository),
            Arc::new(SqlitePublisherRepository),
            Arc::new(SqliteLegalDepositRepository),
        )
    }

    pub async fn create(&self, request: BookRequest) -> BookResult<BookResponse> {
        let draft = request.validate()?;
        let mut tx = self.db.begin_write().await?;

        let publisher_id = self.require_publisher(&mut tx, draft.publisher_id).await?;
        let author_ids = self.resolve_authors(&mut tx, &draft.author_ids).await?;

        let mut book = Book::new(
            draft.title,
            draft.isbn,
            draft.pages,
            draft.language,
            publisher_id,
            author_ids,
        );
        self.books.save(&mut tx, &book).await?;

        // The deposit row references the book, so the book has to exist first.
        let deposit = LegalDeposit::new(book.id, draft.deposit_code, &draft.country);
        let deposit = self.deposits.save(&mut tx, &deposit).await?;

        book.legal_deposit_id = Some(deposit.id);
        let book = self.books.save(&mut tx, &book).await?;

        tx.commit().await?;
        tracing::info!(book_id = %book.id, deposit_id = %deposit.id, "book created");

        Ok(BookResponse::new(&book, Some(&deposit)))
    }

    /// Every book in storage order.
    pub async fn read_all(&self) -> BookResult<Vec<BookResponse>> {
        let mut tx = self.db.begin().await?;

        let books = self.books.find_all(&mut tx).await?;
        let mut deposits: HashMap<BookId, LegalDeposit> = self
            .deposits
            .find_all(&mut tx)
            .await?
            .into_iter()
            .map(|deposit| (deposit.book_id, deposit))
            .collect();

        tx.commit().await?;
        Ok(books
            .iter()
            .map(|book| BookResponse::new(book, deposits.remove(&book.id).as_ref()))
            .collect())
    }

    pub async fn read_one(&self, id: BookId) -> BookResult<BookResponse> {
        let mut tx = self.db.begin().await?;

        let book = self
            .books
            .find_by_id(&mut tx, id)
            .await?
            .ok_or(BookError::NotFound(messages::BOOK_NOT_FOUND))?;
        let deposit = self.deposits.find_by_book_id(&mut tx, book.id).await?;

        tx.commit().await?;
        Ok(BookResponse::new(&book, deposit.as_ref()))
    }

    /// Replace every field of the book; an existing deposit keeps its id.
    pub async fn update(&self, id: BookId, request: BookRequest) -> BookResult<BookResponse> {
        let draft = request.validate()?;
        let mut tx = self.db.begin_write().await?;

        let mut book = self
            .books
            .find_by_id(&mut tx, id)
            .await?
            .ok_or(BookError::NotFound(messages::BOOK_NOT_FOUND))?;
        let publisher_id = self.require_publisher(&mut tx, draft.publisher_id).await?;
        let author_ids = self.resolve_authors(&mut tx, &draft.author_ids).await?;

        book.title = draft.title;
        book.isbn = draft.isbn;
        book.pages = draft.pages;
        book.language = draft.language;
        book.publisher_id = Some(publisher_id);
        book.author_ids = author_ids;

        let existing = match book.legal_deposit_id {
            Some(deposit_id) => self.deposits.find_by_id(&mut tx, deposit_id).await?,
            None => None,
        };
        let deposit = match existing {
            Some(mut deposit) => {
                deposit.register(draft.deposit_code, &draft.country);
                deposit
            }
            None => LegalDeposit::new(book.id, draft.deposit_code, &draft.country),
        };
        let deposit = self.deposits.save(&mut tx, &deposit).await?;

        book.legal_deposit_id = Some(deposit.id);
        let book = self.books.save(&mut tx, &book).await?;

        tx.commit().await?;
        tracing::info!(book_id = %book.id, deposit_id = %deposit.id, "book updated");

        Ok(BookResponse::new(&book, Some(&deposit)))
    }

    /// Remove the book; its deposit and author links go with it.
    pub async fn delete(&self, id: BookId) -> BookResult<()> {
        let mut tx = self.db.begin_write().await?;

        if !self.books.exists_by_id(&mut tx, id).await? {
            return Err(BookError::NotFound(messages::BOOK_NOT_FOUND));
        }
        self.books.delete_by_id(&mut tx, id).await?;

        tx.commit().await?;
        tracing::info!(book_id = %id, "book deleted");
        Ok(())
    }

    async fn require_publisher(
        &self,
        conn: &mut SqliteConnection,
        id: PublisherId,
    ) -> BookResult<PublisherId> {
        if !self.publishers.exists_by_id(conn, id).await? {
            return Err(BookError::NotFound(messages::PUBLISHER_NOT_FOUND));
        }
        Ok(id)
    }

    /// Known authors among `ids`; unknown ids are dropped, an empty result fails.
    async fn resolve_authors(
        &self,
        conn: &mut SqliteConnection,
        ids: &BTreeSet<AuthorId>,
    ) -> BookResult<BTreeSet<AuthorId>> {
        let resolved: BTreeSet<AuthorId> = self
            .authors
            .find_all_by_id(conn, ids)
            .await?
            .into_iter()
            .map(|author| author.id)
            .collect();

        if resolved.is_empty() {
            return Err(BookError::invalid_input(
                messages::AT_LEAST_ONE_AUTHOR_REQUIRED,
            ));
        }
        Ok(resolved)
    }
}
