//! Catalog repository
//!
//! sqlx-backed CRUD for books, authors and genres.

use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::{Author, Book, BookFilter, BookRecord, Genre, Page};

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

/// Map a unique-constraint violation to a client error.
fn map_unique(e: sqlx::Error, what: &str) -> AppError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return AppError::InvalidRequest(format!("{} already exists", what));
        }
    }
    AppError::Database(e)
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Authors
    // =========================================================================

    pub async fn create_author(
        &self,
        name: String,
        biography: Option<String>,
        country: Option<String>,
    ) -> AppResult<Author> {
        let author: Author = sqlx::query_as(
            r#"
            INSERT INTO authors (id, name, biography, country)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, biography, country
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(biography)
        .bind(country)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "author name"))?;

        Ok(author)
    }

    pub async fn get_author(&self, author_id: Uuid) -> AppResult<Author> {
        let author: Option<Author> =
            sqlx::query_as("SELECT id, name, biography, country FROM authors WHERE id = $1")
                .bind(author_id)
                .fetch_optional(&self.pool)
                .await?;

        author.ok_or_else(|| AppError::AuthorNotFound(author_id.to_string()))
    }

    pub async fn update_author(
        &self,
        author_id: Uuid,
        name: Option<String>,
        biography: Option<String>,
        country: Option<String>,
    ) -> AppResult<Author> {
        let author: Option<Author> = sqlx::query_as(
            r#"
            UPDATE authors
            SET name = COALESCE($2, name),
                biography = COALESCE($3, biography),
                country = COALESCE($4, country)
            WHERE id = $1
            RETURNING id, name, biography, country
            "#,
        )
        .bind(author_id)
        .bind(name)
        .bind(biography)
        .bind(country)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique(e, "author name"))?;

        author.ok_or_else(|| AppError::AuthorNotFound(author_id.to_string()))
    }

    pub async fn delete_author(&self, author_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(author_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::AuthorNotFound(author_id.to_string()));
        }
        Ok(())
    }

    pub async fn list_authors(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Page<Author>> {
        let pattern = search.map(|s| format!("%{}%", s));

        let (items, total) = match pattern {
            Some(pattern) => {
                let items: Vec<Author> = sqlx::query_as(
                    r#"
                    SELECT id, name, biography, country
                    FROM authors
                    WHERE name ILIKE $1 OR country ILIKE $1
                    ORDER BY name
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(&pattern)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM authors WHERE name ILIKE $1 OR country ILIKE $1",
                )
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;

                (items, total)
            }
            None => {
                let items: Vec<Author> = sqlx::query_as(
                    "SELECT id, name, biography, country FROM authors ORDER BY name LIMIT $1 OFFSET $2",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors")
                    .fetch_one(&self.pool)
                    .await?;

                (items, total)
            }
        };

        Ok(Page { items, total })
    }

    // =========================================================================
    // Genres
    // =========================================================================

    pub async fn create_genre(&self, title: String) -> AppResult<Genre> {
        let genre: Genre = sqlx::query_as(
            "INSERT INTO genres (id, title) VALUES ($1, $2) RETURNING id, title",
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "genre title"))?;

        Ok(genre)
    }

    pub async fn get_genre(&self, genre_id: Uuid) -> AppResult<Genre> {
        let genre: Option<Genre> =
            sqlx::query_as("SELECT id, title FROM genres WHERE id = $1")
                .bind(genre_id)
                .fetch_optional(&self.pool)
                .await?;

        genre.ok_or_else(|| AppError::GenreNotFound(genre_id.to_string()))
    }

    pub async fn update_genre(&self, genre_id: Uuid, title: String) -> AppResult<Genre> {
        let genre: Option<Genre> = sqlx::query_as(
            "UPDATE genres SET title = $2 WHERE id = $1 RETURNING id, title",
        )
        .bind(genre_id)
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique(e, "genre title"))?;

        genre.ok_or_else(|| AppError::GenreNotFound(genre_id.to_string()))
    }

    /// Delete a genre. Books referencing it keep existing with a null
    /// genre (ON DELETE SET NULL on the foreign key).
    pub async fn delete_genre(&self, genre_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM genres WHERE id = $1")
            .bind(genre_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::GenreNotFound(genre_id.to_string()));
        }
        Ok(())
    }

    pub async fn list_genres(&self, limit: i64, offset: i64) -> AppResult<Page<Genre>> {
        let items: Vec<Genre> =
            sqlx::query_as("SELECT id, title FROM genres ORDER BY title LIMIT $1 OFFSET $2")
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM genres")
            .fetch_one(&self.pool)
            .await?;

        Ok(Page { items, total })
    }

    // =========================================================================
    // Books
    // =========================================================================

    pub async fn create_book(
        &self,
        title: String,
        description: Option<String>,
        year_of_publication: Option<String>,
        genre_id: Option<Uuid>,
        author_ids: Vec<Uuid>,
    ) -> AppResult<BookRecord> {
        let mut tx = self.pool.begin().await?;

        if let Some(genre_id) = genre_id {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM genres WHERE id = $1)")
                    .bind(genre_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(AppError::GenreNotFound(genre_id.to_string()));
            }
        }

        let book: Book = sqlx::query_as(
            r#"
            INSERT INTO books (id, title, description, year_of_publication, genre_id, is_available)
            VALUES ($1, $2, $3, $4, $5, true)
            RETURNING id, title, description, year_of_publication, genre_id, is_available
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(description)
        .bind(year_of_publication)
        .bind(genre_id)
        .fetch_one(&mut *tx)
        .await?;

        for author_id in &author_ids {
            let inserted = sqlx::query(
                r#"
                INSERT INTO book_authors (book_id, author_id)
                SELECT $1, id FROM authors WHERE id = $2
                "#,
            )
            .bind(book.id)
            .bind(author_id)
            .execute(&mut *tx)
            .await?;

            if inserted.rows_affected() == 0 {
                return Err(AppError::AuthorNotFound(author_id.to_string()));
            }
        }

        tx.commit().await?;

        Ok(BookRecord {
            book,
            authors: author_ids,
        })
    }

    pub async fn get_book(&self, book_id: Uuid) -> AppResult<BookRecord> {
        let book: Option<Book> = sqlx::query_as(
            r#"
            SELECT id, title, description, year_of_publication, genre_id, is_available
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        let book = book.ok_or_else(|| AppError::BookNotFound(book_id.to_string()))?;
        let authors = self.book_author_ids(book_id).await?;

        Ok(BookRecord { book, authors })
    }

    pub async fn update_book(
        &self,
        book_id: Uuid,
        title: Option<String>,
        description: Option<String>,
        year_of_publication: Option<String>,
        genre_id: Option<Uuid>,
        author_ids: Option<Vec<Uuid>>,
    ) -> AppResult<BookRecord> {
        let mut tx = self.pool.begin().await?;

        let book: Option<Book> = sqlx::query_as(
            r#"
            UPDATE books
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                year_of_publication = COALESCE($4, year_of_publication),
                genre_id = COALESCE($5, genre_id)
            WHERE id = $1
            RETURNING id, title, description, year_of_publication, genre_id, is_available
            "#,
        )
        .bind(book_id)
        .bind(title)
        .bind(description)
        .bind(year_of_publication)
        .bind(genre_id)
        .fetch_optional(&mut *tx)
        .await?;

        let book = book.ok_or_else(|| AppError::BookNotFound(book_id.to_string()))?;

        if let Some(author_ids) = &author_ids {
            sqlx::query("DELETE FROM book_authors WHERE book_id = $1")
                .bind(book_id)
                .execute(&mut *tx)
                .await?;

            for author_id in author_ids {
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO book_authors (book_id, author_id)
                    SELECT $1, id FROM authors WHERE id = $2
                    "#,
                )
                .bind(book_id)
                .bind(author_id)
                .execute(&mut *tx)
                .await?;

                if inserted.rows_affected() == 0 {
                    return Err(AppError::AuthorNotFound(author_id.to_string()));
                }
            }
        }

        tx.commit().await?;

        let authors = match author_ids {
            Some(ids) => ids,
            None => self.book_author_ids(book_id).await?,
        };

        Ok(BookRecord { book, authors })
    }

    pub async fn delete_book(&self, book_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BookNotFound(book_id.to_string()));
        }
        Ok(())
    }

    pub async fn list_books(
        &self,
        filter: &BookFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Page<Book>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, title, description, year_of_publication, genre_id, is_available FROM books",
        );
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM books");

        for builder in [&mut query, &mut count] {
            builder.push(" WHERE true");
            if let Some(title) = &filter.title {
                builder.push(" AND title = ").push_bind(title.clone());
            }
            if let Some(genre_id) = filter.genre_id {
                builder.push(" AND genre_id = ").push_bind(genre_id);
            }
            if let Some(is_available) = filter.is_available {
                builder.push(" AND is_available = ").push_bind(is_available);
            }
            if let Some(search) = &filter.search {
                let pattern = format!("%{}%", search);
                builder
                    .push(" AND (title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR description ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
        }

        query.push(" ORDER BY title LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);

        let items: Vec<Book> = query.build_query_as().fetch_all(&self.pool).await?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Page { items, total })
    }

    async fn book_author_ids(&self, book_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT author_id FROM book_authors WHERE book_id = $1 ORDER BY author_id",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
