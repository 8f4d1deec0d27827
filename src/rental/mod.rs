//! Rental lifecycle
//!
//! The ledger owns the rental state machine and the book-availability
//! invariant: at most one open rental exists per book, and the book's
//! `is_available` flag is false exactly while that rental is open. Every
//! transition (create, close-by-return, close-by-delete) runs as one
//! database transaction serialized on the contended row.

mod ledger;
mod queries;

pub use ledger::RentalLedger;
pub use queries::{RentalPage, RentalQueries, RentalView};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One loan of a book to a reader, active or historical.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rental {
    pub id: Uuid,
    pub book_id: Uuid,
    pub reader_id: Uuid,
    pub rental_date: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub is_returned: bool,
}

impl Rental {
    /// An open rental has no recorded return.
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_open_rental_has_no_return_date() {
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
        assert!(rental.is_open());

        let closed = Rental {
            return_date: Some(now),
            is_returned: true,
            ..rental
        };
        assert!(!closed.is_open());
    }
}
