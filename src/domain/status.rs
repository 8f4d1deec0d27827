//! Derived rental status
//!
//! Status is a read-side projection, never stored. The close path stamps
//! both `return_date` and `is_returned` in the same transaction, so the
//! returned flag is authoritative here: a returned rental is "closed" even
//! when its deadline has passed, and "overdue" applies only to open
//! rentals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    Overdue,
    Closed,
    Active,
}

impl RentalStatus {
    /// Derive status from the stored rental fields at a given instant.
    pub fn derive(deadline: DateTime<Utc>, is_returned: bool, now: DateTime<Utc>) -> Self {
        if is_returned {
            RentalStatus::Closed
        } else if deadline < now {
            RentalStatus::Overdue
        } else {
            RentalStatus::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Overdue => "overdue",
            RentalStatus::Closed => "closed",
            RentalStatus::Active => "active",
        }
    }
}
