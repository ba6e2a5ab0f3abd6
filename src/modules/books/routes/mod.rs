//! HTTP adapter for the book workflow.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bookstore_http::error::AppError;
use serde_json::json;
use utoipa::OpenApi;
use uuid::Uuid;

use super::dto::{BookRequest, BookResponse};
use super::error::BookError;
use super::messages;
use super::service::BookService;

type BookState = Arc<BookService>;

#[derive(OpenApi)]
#[openapi(
    paths(create_book, list_books, get_book, update_book, delete_book, health_check),
    components(schemas(BookRequest, BookResponse)),
    tags((name = "Books", description = "Book catalog with legal deposit registration"))
)]
pub struct BooksApi;

/// Routes of the books module, relative to its mount point.
pub fn router(service: BookState) -> Router {
    Router::new()
        .route("/", post(create_book).get(list_books))
        .route("/health", get(health_check))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .with_state(service)
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::NotFound(message) => AppError::not_found(message),
            BookError::InvalidInput { message, details } => AppError::validation(
                details
                    .iter()
                    .map(|violation| json!({ "field": violation.field, "error": violation.error }))
                    .collect(),
                message,
            ),
            BookError::Conflict(constraint) => AppError::conflict(
                vec![json!({ "constraint": constraint })],
                messages::BOOK_CONFLICT,
            ),
            err @ BookError::Storage(_) => AppError::Internal(anyhow::Error::new(err)),
        }
    }
}

fn book_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::not_found(messages::BOOK_NOT_FOUND))
}

fn book_request(body: Result<Json<BookRequest>, JsonRejection>) -> Result<BookRequest, AppError> {
    body.map(|Json(request)| request)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// Create a book and its legal deposit
#[utoipa::path(
    post,
    path = "/",
    tag = "Books",
    request_body = BookRequest,
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Malformed JSON body"),
        (status = 404, description = "Publisher not found"),
        (status = 409, description = "A unique value is already taken"),
        (status = 422, description = "Invalid fields or no known author")
    )
)]
async fn create_book(
    State(service): State<BookState>,
    body: Result<Json<BookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookResponse>), AppError> {
    let request = book_request(body)?;
    let response = service.create(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// List every book
#[utoipa::path(
    get,
    path = "/",
    tag = "Books",
    responses((status = 200, description = "All books", body = [BookResponse]))
)]
async fn list_books(State(service): State<BookState>) -> Result<Json<Vec<BookResponse>>, AppError> {
    Ok(Json(service.read_all().await?))
}

/// Fetch one book
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Books",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book", body = BookResponse),
        (status = 404, description = "Book not found")
    )
)]
async fn get_book(
    State(service): State<BookState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<BookResponse>, AppError> {
    let id = book_id(path)?;
    Ok(Json(service.read_one(id).await?))
}

/// Replace a book and its legal deposit
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Books",
    params(("id" = Uuid, Path, description = "Book id")),
    request_body = BookRequest,
    responses(
        (status = 200, description = "Book updated", body = BookResponse),
        (status = 400, description = "Malformed JSON body"),
        (status = 404, description = "Book or publisher not found"),
        (status = 409, description = "A unique value is already taken"),
        (status = 422, description = "Invalid fields or no known author")
    )
)]
async fn update_book(
    State(service): State<BookState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<BookRequest>, JsonRejection>,
) -> Result<Json<BookResponse>, AppError> {
    let id = book_id(path)?;
    let request = book_request(body)?;
    Ok(Json(service.update(id, request).await?))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Books",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book deleted", body = String, content_type = "text/plain"),
        (status = 404, description = "Book not found")
    )
)]
async fn delete_book(
    State(service): State<BookState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<&'static str, AppError> {
    let id = book_id(path)?;
    service.delete(id).await?;
    Ok(messages::BOOK_DELETE_SUCCESSFULLY)
}

/// Books module health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "Books",
    responses((status = 200, description = "OK", body = String, content_type = "text/plain"))
)]
async fn health_check() -> &'static str {
    "books module is healthy"
}
