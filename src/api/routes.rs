//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::catalog::{Author, Book, BookFilter, BookRecord, CatalogRepository, Genre};
use crate::domain::Caller;
use crate::error::AppError;
use crate::policy;
use crate::rental::{Rental, RentalLedger, RentalQueries, RentalView};

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRentalRequest {
    pub book: Uuid,
    pub reader: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RentalResponse {
    pub pk: Uuid,
    pub reader: Uuid,
    pub book: Uuid,
    pub rental_date: DateTime<Utc>,
    pub is_returned: bool,
    pub deadline: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
}

impl From<Rental> for RentalResponse {
    fn from(rental: Rental) -> Self {
        Self {
            pk: rental.id,
            reader: rental.reader_id,
            book: rental.book_id,
            rental_date: rental.rental_date,
            is_returned: rental.is_returned,
            deadline: rental.deadline,
            return_date: rental.return_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RentalListResponse {
    pub rentals: Vec<RentalResponse>,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Clamp caller-supplied pagination so negative values never reach the
/// database as LIMIT/OFFSET arguments.
fn page_bounds(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(0, 200), offset.max(0))
}

#[derive(Debug, Deserialize)]
pub struct BookListQuery {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub genre: Option<Uuid>,
    #[serde(default)]
    pub is_available: Option<bool>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub year_of_publication: Option<String>,
    #[serde(default)]
    pub genre: Option<Uuid>,
    #[serde(default)]
    pub authors: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBookRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub year_of_publication: Option<String>,
    #[serde(default)]
    pub genre: Option<Uuid>,
    #[serde(default)]
    pub authors: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
pub struct BookListResponse {
    pub books: Vec<Book>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuthorRequest {
    pub name: String,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAuthorRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthorListQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct AuthorListResponse {
    pub authors: Vec<Author>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct GenreListResponse {
    pub genres: Vec<Genre>,
    pub total: i64,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<PgPool> {
    Router::new()
        // Rentals
        .route("/rent", post(create_rental))
        .route("/rent", get(list_rentals))
        .route("/rent/:rental_id", get(retrieve_rental))
        .route("/rent/:rental_id", put(return_rental))
        .route("/rent/:rental_id", patch(return_rental))
        .route("/rent/:rental_id", delete(delete_rental))
        // Books
        .route("/books", post(create_book))
        .route("/books", get(list_books))
        .route("/books/:book_id", get(get_book))
        .route("/books/:book_id", put(update_book))
        .route("/books/:book_id", patch(update_book))
        .route("/books/:book_id", delete(delete_book))
        // Authors
        .route("/authors", post(create_author))
        .route("/authors", get(list_authors))
        .route("/authors/:author_id", get(get_author))
        .route("/authors/:author_id", put(update_author))
        .route("/authors/:author_id", patch(update_author))
        .route("/authors/:author_id", delete(delete_author))
        // Genres
        .route("/genres", post(create_genre))
        .route("/genres", get(list_genres))
        .route("/genres/:genre_id", get(get_genre))
        .route("/genres/:genre_id", put(update_genre))
        .route("/genres/:genre_id", patch(update_genre))
        .route("/genres/:genre_id", delete(delete_genre))
}

// =========================================================================
// POST /rent
// =========================================================================

/// Check out a book
async fn create_rental(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<CreateRentalRequest>,
) -> Result<(StatusCode, Json<RentalResponse>), AppError> {
    policy::authorize_create(&caller, request.reader)?;

    let rental = RentalLedger::new(pool)
        .create(request.book, request.reader)
        .await?;

    Ok((StatusCode::CREATED, Json(rental.into())))
}

// =========================================================================
// GET /rent
// =========================================================================

/// List rentals, scoped to the caller unless privileged
async fn list_rentals(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Query(page): Query<PageQuery>,
) -> Result<Json<RentalListResponse>, AppError> {
    policy::authorize_list(&caller)?;

    let reader_scope = if caller.is_staff() {
        None
    } else {
        caller.user_id
    };

    let (limit, offset) = page_bounds(page.limit, page.offset);
    let page_result = RentalQueries::new(pool)
        .list(reader_scope, limit, offset)
        .await?;

    Ok(Json(RentalListResponse {
        rentals: page_result.rentals.into_iter().map(Into::into).collect(),
        total: page_result.total,
    }))
}

// =========================================================================
// GET /rent/:rental_id
// =========================================================================

/// Retrieve one rental with its derived status
async fn retrieve_rental(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Path(rental_id): Path<Uuid>,
) -> Result<Json<RentalView>, AppError> {
    // Anonymous callers learn nothing about which ids exist
    if !caller.is_authenticated() {
        return Err(AppError::PermissionDenied);
    }

    let rental = RentalQueries::new(pool)
        .find_by_id(rental_id)
        .await?
        .ok_or_else(|| AppError::RentalNotFound(rental_id.to_string()))?;

    policy::authorize_read(&caller, rental_id, rental.reader_id)?;

    Ok(Json(RentalView::from_rental(&rental, Utc::now())))
}

// =========================================================================
// PUT/PATCH /rent/:rental_id
// =========================================================================

/// Record a return, keeping the rental as history
async fn return_rental(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Path(rental_id): Path<Uuid>,
) -> Result<Json<RentalResponse>, AppError> {
    policy::authorize_return(&caller)?;

    let rental = RentalLedger::new(pool).close_by_return(rental_id).await?;

    Ok(Json(rental.into()))
}

// =========================================================================
// DELETE /rent/:rental_id
// =========================================================================

/// Delete a rental record (closes the loan if still open)
async fn delete_rental(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Path(rental_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    policy::authorize_delete(&caller)?;

    RentalLedger::new(pool).close_by_delete(rental_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Books
// =========================================================================

async fn create_book(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<BookRecord>), AppError> {
    policy::authorize_catalog_write(&caller)?;

    if request.title.trim().is_empty() {
        return Err(AppError::InvalidRequest("title must not be empty".to_string()));
    }

    let book = CatalogRepository::new(pool)
        .create_book(
            request.title,
            request.description,
            request.year_of_publication,
            request.genre,
            request.authors,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(book)))
}

/// Book listing is public
async fn list_books(
    State(pool): State<PgPool>,
    Query(query): Query<BookListQuery>,
) -> Result<Json<BookListResponse>, AppError> {
    let filter = BookFilter {
        title: query.title,
        genre_id: query.genre,
        is_available: query.is_available,
        search: query.search,
    };

    let (limit, offset) = page_bounds(query.limit, query.offset);
    let page = CatalogRepository::new(pool)
        .list_books(&filter, limit, offset)
        .await?;

    Ok(Json(BookListResponse {
        books: page.items,
        total: page.total,
    }))
}

async fn get_book(
    State(pool): State<PgPool>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<BookRecord>, AppError> {
    let book = CatalogRepository::new(pool).get_book(book_id).await?;
    Ok(Json(book))
}

async fn update_book(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Path(book_id): Path<Uuid>,
    Json(request): Json<UpdateBookRequest>,
) -> Result<Json<BookRecord>, AppError> {
    policy::authorize_catalog_write(&caller)?;

    let book = CatalogRepository::new(pool)
        .update_book(
            book_id,
            request.title,
            request.description,
            request.year_of_publication,
            request.genre,
            request.authors,
        )
        .await?;

    Ok(Json(book))
}

async fn delete_book(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Path(book_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    policy::authorize_catalog_write(&caller)?;

    CatalogRepository::new(pool).delete_book(book_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Authors
// =========================================================================

async fn create_author(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<CreateAuthorRequest>,
) -> Result<(StatusCode, Json<Author>), AppError> {
    policy::authorize_catalog_write(&caller)?;

    if request.name.trim().is_empty() {
        return Err(AppError::InvalidRequest("name must not be empty".to_string()));
    }

    let author = CatalogRepository::new(pool)
        .create_author(request.name, request.biography, request.country)
        .await?;

    Ok((StatusCode::CREATED, Json(author)))
}

async fn list_authors(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<AuthorListQuery>,
) -> Result<Json<AuthorListResponse>, AppError> {
    policy::authorize_catalog_admin_read(&caller)?;

    let (limit, offset) = page_bounds(query.limit, query.offset);
    let page = CatalogRepository::new(pool)
        .list_authors(query.search, limit, offset)
        .await?;

    Ok(Json(AuthorListResponse {
        authors: page.items,
        total: page.total,
    }))
}

async fn get_author(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Path(author_id): Path<Uuid>,
) -> Result<Json<Author>, AppError> {
    policy::authorize_catalog_admin_read(&caller)?;

    let author = CatalogRepository::new(pool).get_author(author_id).await?;
    Ok(Json(author))
}

async fn update_author(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Path(author_id): Path<Uuid>,
    Json(request): Json<UpdateAuthorRequest>,
) -> Result<Json<Author>, AppError> {
    policy::authorize_catalog_write(&caller)?;

    let author = CatalogRepository::new(pool)
        .update_author(author_id, request.name, request.biography, request.country)
        .await?;

    Ok(Json(author))
}

async fn delete_author(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Path(author_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    policy::authorize_catalog_write(&caller)?;

    CatalogRepository::new(pool).delete_author(author_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Genres
// =========================================================================

async fn create_genre(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<GenreRequest>,
) -> Result<(StatusCode, Json<Genre>), AppError> {
    policy::authorize_catalog_write(&caller)?;

    if request.title.trim().is_empty() {
        return Err(AppError::InvalidRequest("title must not be empty".to_string()));
    }

    let genre = CatalogRepository::new(pool).create_genre(request.title).await?;

    Ok((StatusCode::CREATED, Json(genre)))
}

async fn list_genres(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Query(page): Query<PageQuery>,
) -> Result<Json<GenreListResponse>, AppError> {
    policy::authorize_catalog_admin_read(&caller)?;

    let (limit, offset) = page_bounds(page.limit, page.offset);
    let result = CatalogRepository::new(pool)
        .list_genres(limit, offset)
        .await?;

    Ok(Json(GenreListResponse {
        genres: result.items,
        total: result.total,
    }))
}

async fn get_genre(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Path(genre_id): Path<Uuid>,
) -> Result<Json<Genre>, AppError> {
    policy::authorize_catalog_admin_read(&caller)?;

    let genre = CatalogRepository::new(pool).get_genre(genre_id).await?;
    Ok(Json(genre))
}

async fn update_genre(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Path(genre_id): Path<Uuid>,
    Json(request): Json<GenreRequest>,
) -> Result<Json<Genre>, AppError> {
    policy::authorize_catalog_write(&caller)?;

    let genre = CatalogRepository::new(pool)
        .update_genre(genre_id, request.title)
        .await?;

    Ok(Json(genre))
}

async fn delete_genre(
    State(pool): State<PgPool>,
    Extension(caller): Extension<Caller>,
    Path(genre_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    policy::authorize_catalog_write(&caller)?;

    CatalogRepository::new(pool).delete_genre(genre_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_create_rental_request_deserialize() {
        let json = r#"{
            "book": "550e8400-e29b-41d4-a716-446655440000",
            "reader": "550e8400-e29b-41d4-a716-446655440001"
        }"#;

        let request: CreateRentalRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            request.book.to_string(),
            "550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn test_page_query_defaults() {
        let query: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn test_page_bounds_clamps_both_ends() {
        assert_eq!(page_bounds(50, 0), (50, 0));
        assert_eq!(page_bounds(1000, 10), (200, 10));
        assert_eq!(page_bounds(-1, -5), (0, 0));
    }

    #[test]
    fn test_book_list_query_defaults() {
        let query: BookListQuery = serde_json::from_str("{}").unwrap();
        assert!(query.title.is_none());
        assert!(query.is_available.is_none());
        assert_eq!(query.limit, 50);
    }

    #[test]
    fn test_rental_response_from_rental() {
        let now = Utc::now();
        let rental = Rental {
            id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
            reader_id: Uuid::new_v4(),
            rental_date: now,
            deadline: now + Duration::days(30),
            return_date: None,
            is_returned: false,
        };

        let response = RentalResponse::from(rental.clone());
        assert_eq!(response.pk, rental.id);
        assert_eq!(response.book, rental.book_id);
        assert_eq!(response.reader, rental.reader_id);
        assert!(!response.is_returned);
        assert!(response.return_date.is_none());
    }

    #[test]
    fn test_create_book_request_defaults() {
        let json = r#"{"title": "Dune"}"#;
        let request: CreateBookRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.title, "Dune");
        assert!(request.authors.is_empty());
        assert!(request.genre.is_none());
    }
}
