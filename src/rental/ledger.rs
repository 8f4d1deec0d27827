//! Rental ledger
//!
//! State transitions over (rental, book availability). Each operation
//! locks the contended row with `SELECT ... FOR UPDATE` so that two
//! concurrent checkouts of the same book serialize: exactly one observes
//! the book available and wins, the other sees the flipped flag and fails
//! with a conflict, never a half-applied state.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::LOAN_PERIOD_DAYS;
use crate::error::{AppError, AppResult};

use super::Rental;

/// Owns all writes to the rentals table and the paired availability flag.
#[derive(Debug, Clone)]
pub struct RentalLedger {
    pool: PgPool,
}

impl RentalLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Create a rental for `book_id` on behalf of `reader_id`.
    ///
    /// Fails with `BookNotFound` / `ReaderNotFound` when the references do
    /// not resolve, and `BookUnavailable` when the book is already out.
    pub async fn create(&self, book_id: Uuid, reader_id: Uuid) -> AppResult<Rental> {
        let mut tx = self.pool.begin().await?;

        let reader_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND is_active)",
        )
        .bind(reader_id)
        .fetch_one(&mut *tx)
        .await?;

        if !reader_exists {
            return Err(AppError::ReaderNotFound(reader_id.to_string()));
        }

        // Row lock on the book serializes concurrent checkouts
        let is_available: Option<bool> = sqlx::query_scalar(
            "SELECT is_available FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let is_available =
            is_available.ok_or_else(|| AppError::BookNotFound(book_id.to_string()))?;

        if !is_available {
            return Err(AppError::BookUnavailable);
        }

        sqlx::query("UPDATE books SET is_available = false WHERE id = $1")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        let rental_date = Utc::now();
        let deadline = rental_date + Duration::days(LOAN_PERIOD_DAYS);

        let rental: Rental = sqlx::query_as(
            r#"
            INSERT INTO rentals (id, book_id, reader_id, rental_date, deadline, return_date, is_returned)
            VALUES ($1, $2, $3, $4, $5, NULL, false)
            RETURNING id, book_id, reader_id, rental_date, deadline, return_date, is_returned
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(book_id)
        .bind(reader_id)
        .bind(rental_date)
        .bind(deadline)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            rental_id = %rental.id,
            book_id = %book_id,
            reader_id = %reader_id,
            deadline = %deadline,
            "Book checked out"
        );

        Ok(rental)
    }

    // =========================================================================
    // Return (close, record retained)
    // =========================================================================

    /// Close a rental, keeping the record as loan history.
    ///
    /// Stamps `return_date`, sets `is_returned`, and flips the book back to
    /// available in the same transaction. Closing an already-closed rental
    /// is a conflict, not a silent no-op.
    pub async fn close_by_return(&self, rental_id: Uuid) -> AppResult<Rental> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(Uuid, Option<DateTime<Utc>>)> = sqlx::query_as(
            "SELECT book_id, return_date FROM rentals WHERE id = $1 FOR UPDATE",
        )
        .bind(rental_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (book_id, return_date) =
            row.ok_or_else(|| AppError::RentalNotFound(rental_id.to_string()))?;

        if return_date.is_some() {
            return Err(AppError::RentalAlreadyClosed);
        }

        let rental: Rental = sqlx::query_as(
            r#"
            UPDATE rentals
            SET return_date = $2, is_returned = true
            WHERE id = $1
            RETURNING id, book_id, reader_id, rental_date, deadline, return_date, is_returned
            "#,
        )
        .bind(rental_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE books SET is_available = true WHERE id = $1")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(rental_id = %rental_id, book_id = %book_id, "Book returned");

        Ok(rental)
    }

    // =========================================================================
    // Delete (close, record removed)
    // =========================================================================

    /// Delete a rental record.
    ///
    /// Deleting the open rental closes the loan and frees the book.
    /// Deleting an already-closed rental only removes the history row; the
    /// availability flag is left alone, since the book may be out again
    /// under a newer rental.
    pub async fn close_by_delete(&self, rental_id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(Uuid, Option<DateTime<Utc>>)> = sqlx::query_as(
            "SELECT book_id, return_date FROM rentals WHERE id = $1 FOR UPDATE",
        )
        .bind(rental_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (book_id, return_date) =
            row.ok_or_else(|| AppError::RentalNotFound(rental_id.to_string()))?;

        let was_open = return_date.is_none();

        if was_open {
            sqlx::query("UPDATE books SET is_available = true WHERE id = $1")
                .bind(book_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM rentals WHERE id = $1")
            .bind(rental_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            rental_id = %rental_id,
            book_id = %book_id,
            was_open = was_open,
            "Rental record deleted"
        );

        Ok(())
    }
}
