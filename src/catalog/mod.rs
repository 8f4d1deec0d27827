//! Catalog
//!
//! Books, authors and genres. Plain CRUD with filters; the only coupling
//! to the rental core is the `is_available` flag, which the ledger owns.

mod repository;

pub use repository::CatalogRepository;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub biography: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Genre {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub year_of_publication: Option<String>,
    pub genre_id: Option<Uuid>,
    pub is_available: bool,
}

/// Book plus its attached author ids, as served by the API.
#[derive(Debug, Clone, Serialize)]
pub struct BookRecord {
    #[serde(flatten)]
    pub book: Book,
    pub authors: Vec<Uuid>,
}

/// Filters for book listing.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    /// Exact title match
    pub title: Option<String>,
    pub genre_id: Option<Uuid>,
    pub is_available: Option<bool>,
    /// Case-insensitive substring search over title and description
    pub search: Option<String>,
}

/// One page of catalog rows plus the total matching count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}
