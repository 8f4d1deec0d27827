//! Rental read side
//!
//! Listing with caller scoping and the retrieve view with derived status.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::RentalStatus;
use crate::error::AppResult;

use super::Rental;

/// One page of rentals plus the total matching count.
#[derive(Debug, Clone)]
pub struct RentalPage {
    pub rentals: Vec<Rental>,
    pub total: i64,
}

/// Retrieve view: raw return bookkeeping replaced by the derived status.
#[derive(Debug, Clone, Serialize)]
pub struct RentalView {
    pub pk: Uuid,
    pub reader: Uuid,
    pub book: Uuid,
    pub rental_date: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub status: RentalStatus,
}

impl RentalView {
    pub fn from_rental(rental: &Rental, now: DateTime<Utc>) -> Self {
        Self {
            pk: rental.id,
            reader: rental.reader_id,
            book: rental.book_id,
            rental_date: rental.rental_date,
            deadline: rental.deadline,
            status: RentalStatus::derive(rental.deadline, rental.is_returned, now),
        }
    }
}

/// Read-only queries over the rentals table.
#[derive(Debug, Clone)]
pub struct RentalQueries {
    pool: PgPool,
}

impl RentalQueries {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, rental_id: Uuid) -> AppResult<Option<Rental>> {
        let rental: Option<Rental> = sqlx::query_as(
            r#"
            SELECT id, book_id, reader_id, rental_date, deadline, return_date, is_returned
            FROM rentals
            WHERE id = $1
            "#,
        )
        .bind(rental_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rental)
    }

    /// List rentals, most recent first. `reader_scope` restricts the result
    /// to one reader's records; privileged callers pass `None` for all.
    pub async fn list(
        &self,
        reader_scope: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> AppResult<RentalPage> {
        let (rentals, total) = match reader_scope {
            Some(reader_id) => {
                let rentals: Vec<Rental> = sqlx::query_as(
                    r#"
                    SELECT id, book_id, reader_id, rental_date, deadline, return_date, is_returned
                    FROM rentals
                    WHERE reader_id = $1
                    ORDER BY rental_date DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(reader_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM rentals WHERE reader_id = $1")
                        .bind(reader_id)
                        .fetch_one(&self.pool)
                        .await?;

                (rentals, total)
            }
            None => {
                let rentals: Vec<Rental> = sqlx::query_as(
                    r#"
                    SELECT id, book_id, reader_id, rental_date, deadline, return_date, is_returned
                    FROM rentals
                    ORDER BY rental_date DESC
                    LIMIT $1 OFFSET $2
                    "#,
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rentals")
                    .fetch_one(&self.pool)
                    .await?;

                (rentals, total)
            }
        };

        Ok(RentalPage { rentals, total })
    }
}
