use std::collections::BTreeSet;
use std::sync::Arc;

use bookstore_app::books::dto::BookRequest;
use bookstore_app::books::error::BookError;
use bookstore_app::books::messages;
use bookstore_app::books::models::{Author, Book, Publisher};
use bookstore_app::books::repository::{
    AuthorRepository, BookRepository, LegalDepositRepository, PublisherRepository,
    SqliteAuthorRepository, SqliteBookRepository, SqliteLegalDepositRepository,
    SqlitePublisherRepository,
};
use bookstore_app::books::service::BookService;
use bookstore_db::Database;
use bookstore_kernel::settings::DatabaseSettings;
use uuid::Uuid;

struct Fixture {
    db: Database,
    service: BookService,
    publisher: Publisher,
    authors: Vec<Author>,
}

async fn fixture() -> Fixture {
    seeded(Database::in_memory().await.unwrap()).await
}

async fn seeded(db: Database) -> Fixture {
    let migrations: Vec<_> = bookstore_app::books::migrations()
        .into_iter()
        .map(|migration| ("books".to_string(), migration))
        .collect();
    db.migrate(&migrations).await.unwrap();

    let mut tx = db.begin().await.unwrap();
    let publisher = SqlitePublisherRepository
        .save(&mut tx, &Publisher::new("Penguin"))
        .await
        .unwrap();
    let mut authors = Vec::new();
    for (name, nationality) in [("Ursula K. Le Guin", "American"), ("Italo Calvino", "Italian")] {
        authors.push(
            SqliteAuthorRepository
                .save(&mut tx, &Author::new(name, nationality))
                .await
                .unwrap(),
        );
    }
    tx.commit().await.unwrap();

    Fixture {
        service: BookService::sqlite(db.clone()),
        db,
        publisher,
        authors,
    }
}

impl Fixture {
    fn request(&self, title: &str, language: &str, code: &str, country: &str) -> BookRequest {
        BookRequest {
            id: None,
            title: title.to_string(),
            isbn: format!("isbn-{title}"),
            pages: 300,
            language: language.to_string(),
            publisher_id: Some(self.publisher.id),
            author_ids: self.authors.iter().map(|author| author.id).collect(),
            deposit_code_registration: code.to_string(),
            country: country.to_string(),
        }
    }

    async fn book_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM tb_book")
            .fetch_one(self.db.pool())
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn create_returns_resolved_authors_and_submitted_code() {
    let fx = fixture().await;
    let unknown = Uuid::now_v7();
    let mut request = fx.request("The Dispossessed", "en", "dl-en-001", "us");
    request.author_ids.insert(unknown);

    let created = fx.service.create(request).await.unwrap();

    let expected: BTreeSet<Uuid> = fx.authors.iter().map(|author| author.id).collect();
    assert_eq!(created.author_ids, expected);
    assert_eq!(created.deposit_code.as_deref(), Some("dl-en-001"));
    assert_eq!(created.publisher_id, Some(fx.publisher.id));
    assert_eq!(created.pages, 300);
}

#[tokio::test]
async fn create_stores_country_uppercased() {
    let fx = fixture().await;

    let created = fx
        .service
        .create(fx.request("Invisible Cities", "it", "IT-72", "fr"))
        .await
        .unwrap();

    let mut conn = fx.db.pool().acquire().await.unwrap();
    let deposit = SqliteLegalDepositRepository
        .find_by_book_id(&mut conn, created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(deposit.country(), "FR");
    assert_eq!(deposit.deposit_code, "IT-72");
}

#[tokio::test]
async fn unresolvable_authors_are_invalid_input() {
    let fx = fixture().await;
    let existing = fx
        .service
        .create(fx.request("Earthsea", "en", "E-1", "US"))
        .await
        .unwrap();

    for author_ids in [BTreeSet::new(), BTreeSet::from([Uuid::now_v7(), Uuid::now_v7()])] {
        let mut request = fx.request("Lavinia", "la", "L-1", "GB");
        request.author_ids = author_ids.clone();
        let err = fx.service.create(request).await.unwrap_err();
        let author_required = matches!(
            &err,
            BookError::InvalidInput { message, .. }
                if message == messages::AT_LEAST_ONE_AUTHOR_REQUIRED
        );
        assert!(author_required, "unexpected {err:?}");

        let mut request = fx.request("Earthsea", "en", "E-1", "US");
        request.author_ids = author_ids;
        let err = fx.service.update(existing.id, request).await.unwrap_err();
        assert!(matches!(err, BookError::InvalidInput { .. }));
    }

    assert_eq!(fx.book_count().await, 1);
}

#[tokio::test]
async fn unknown_publisher_is_not_found_and_writes_nothing() {
    let fx = fixture().await;
    let mut request = fx.request("Mr. Palomar", "it", "P-1", "IT");
    request.publisher_id = Some(Uuid::now_v7());

    let err = fx.service.create(request.clone()).await.unwrap_err();
    assert!(matches!(err, BookError::NotFound(messages::PUBLISHER_NOT_FOUND)));
    assert_eq!(fx.book_count().await, 0);

    let existing = fx
        .service
        .create(fx.request("Cosmicomics", "it", "C-1", "IT"))
        .await
        .unwrap();
    let err = fx.service.update(existing.id, request).await.unwrap_err();
    assert!(matches!(err, BookError::NotFound(messages::PUBLISHER_NOT_FOUND)));

    let unchanged = fx.service.read_one(existing.id).await.unwrap();
    assert_eq!(unchanged, existing);
}

#[tokio::test]
async fn update_keeps_deposit_identity() {
    let fx = fixture().await;
    let created = fx
        .service
        .create(fx.request("The Lathe of Heaven", "en", "OLD-1", "us"))
        .await
        .unwrap();
    let mut conn = fx.db.pool().acquire().await.unwrap();
    let before = SqliteLegalDepositRepository
        .find_by_book_id(&mut conn, created.id)
        .await
        .unwrap()
        .unwrap();
    drop(conn);

    let mut request = fx.request("The Lathe of Heaven (2nd ed.)", "en-GB", "NEW-2", "gb");
    request.pages = 184;
    request.author_ids = BTreeSet::from([fx.authors[0].id]);
    let updated = fx.service.update(created.id, request).await.unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.title, "The Lathe of Heaven (2nd ed.)");
    assert_eq!(updated.pages, 184);
    assert_eq!(updated.author_ids, BTreeSet::from([fx.authors[0].id]));
    assert_eq!(updated.deposit_code.as_deref(), Some("NEW-2"));

    let mut conn = fx.db.pool().acquire().await.unwrap();
    let after = SqliteLegalDepositRepository
        .find_by_book_id(&mut conn, created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.country(), "GB");
}

#[tokio::test]
async fn update_of_missing_book_is_not_found() {
    let fx = fixture().await;

    let err = fx
        .service
        .update(Uuid::now_v7(), fx.request("Ghost", "xx", "G-1", "XX"))
        .await
        .unwrap_err();

    assert!(matches!(err, BookError::NotFound(messages::BOOK_NOT_FOUND)));
}

#[tokio::test]
async fn delete_removes_book_and_deposit() {
    let fx = fixture().await;
    let err = fx.service.delete(Uuid::now_v7()).await.unwrap_err();
    assert!(matches!(err, BookError::NotFound(messages::BOOK_NOT_FOUND)));

    let created = fx
        .service
        .create(fx.request("Always Coming Home", "en", "ACH-1", "US"))
        .await
        .unwrap();
    fx.service.delete(created.id).await.unwrap();

    let err = fx.service.read_one(created.id).await.unwrap_err();
    assert!(matches!(err, BookError::NotFound(messages::BOOK_NOT_FOUND)));

    let deposits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tb_legal_deposit")
        .fetch_one(fx.db.pool())
        .await
        .unwrap();
    assert_eq!(deposits, 0);
}

#[tokio::test]
async fn read_all_matches_read_one() {
    let fx = fixture().await;
    for (title, language, code, country) in [
        ("A Wizard of Earthsea", "en", "W-1", "US"),
        ("If on a winter's night a traveler", "it", "W-2", "IT"),
        ("The Baron in the Trees", "fr", "W-3", "FR"),
    ] {
        fx.service
            .create(fx.request(title, language, code, country))
            .await
            .unwrap();
    }

    let all = fx.service.read_all().await.unwrap();

    assert_eq!(all.len(), 3);
    for book in &all {
        assert_eq!(&fx.service.read_one(book.id).await.unwrap(), book);
    }
}

#[tokio::test]
async fn failed_deposit_rolls_back_the_book() {
    let fx = fixture().await;
    fx.service
        .create(fx.request("The Word for World Is Forest", "en", "DUP-1", "US"))
        .await
        .unwrap();

    // Book row is written before the deposit collides on its code.
    let err = fx
        .service
        .create(fx.request("The Nonexistent Knight", "it", "DUP-1", "IT"))
        .await
        .unwrap_err();

    assert!(matches!(err, BookError::Conflict(_)), "unexpected {err:?}");
    assert_eq!(fx.book_count().await, 1);
    assert_eq!(fx.service.read_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn language_and_country_are_unique_per_catalog() {
    let fx = fixture().await;
    fx.service
        .create(fx.request("Rocannon's World", "en", "R-1", "US"))
        .await
        .unwrap();

    let same_language = fx
        .service
        .create(fx.request("Planet of Exile", "en", "R-2", "CA"))
        .await
        .unwrap_err();
    assert!(matches!(same_language, BookError::Conflict(ref c) if c.contains("tb_book.language")));

    let same_country = fx
        .service
        .create(fx.request("City of Illusions", "en-US", "R-3", "us"))
        .await
        .unwrap_err();
    assert!(
        matches!(same_country, BookError::Conflict(ref c) if c.contains("tb_legal_deposit.country"))
    );
    assert_eq!(fx.book_count().await, 1);
}

#[tokio::test]
async fn blank_fields_are_rejected_before_storage() {
    let fx = fixture().await;
    let mut request = fx.request("", "en", " ", "US");
    request.pages = 0;

    let Err(BookError::InvalidInput { details, .. }) = fx.service.create(request).await else {
        panic!("expected invalid input");
    };

    let fields: Vec<&str> = details.iter().map(|violation| violation.field).collect();
    assert_eq!(fields, vec!["title", "depositCodeRegistration", "pages"]);
}

#[tokio::test]
async fn update_links_a_deposit_when_the_book_has_none() {
    let fx = fixture().await;
    let mut tx = fx.db.begin().await.unwrap();
    let book = SqliteBookRepository
        .save(
            &mut tx,
            &Book::new(
                "The Left Hand of Darkness",
                "978-0441478125",
                304,
                "en",
                fx.publisher.id,
                BTreeSet::from([fx.authors[0].id]),
            ),
        )
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(fx.service.read_one(book.id).await.unwrap().deposit_code, None);

    let updated = fx
        .service
        .update(
            book.id,
            fx.request("The Left Hand of Darkness", "en", "LHD-1969", "us"),
        )
        .await
        .unwrap();
    assert_eq!(updated.deposit_code.as_deref(), Some("LHD-1969"));

    let fetched = fx.service.read_one(book.id).await.unwrap();
    assert_eq!(fetched.deposit_code.as_deref(), Some("LHD-1969"));

    let mut conn = fx.db.pool().acquire().await.unwrap();
    let deposit = SqliteLegalDepositRepository
        .find_by_book_id(&mut conn, book.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(deposit.country(), "US");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_on_a_file_database_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("books.db").display());
    let db = Database::connect(&DatabaseSettings {
        url,
        max_connections: 5,
    })
    .await
    .unwrap();
    let fx = seeded(db).await;
    let service = Arc::new(BookService::sqlite(fx.db.clone()));

    let mut handles = Vec::new();
    for i in 0..40 {
        let service = Arc::clone(&service);
        let request = fx.request(
            &format!("Hainish Cycle {i}"),
            &format!("lang-{i}"),
            &format!("HC-{i}"),
            &format!("c{i}"),
        );
        handles.push(tokio::spawn(async move { service.create(request).await }));
    }

    let mut failures = Vec::new();
    for handle in handles {
        if let Err(err) = handle.await.unwrap() {
            failures.push(err.to_string());
        }
    }

    assert!(failures.is_empty(), "failed creates: {failures:?}");
    assert_eq!(fx.service.read_all().await.unwrap().len(), 40);
    fx.db.close().await;
}
