//! Caller identity
//!
//! Resolved once by the auth middleware and carried through request
//! extensions. Policy decisions read capabilities from here instead of
//! reaching back into the database.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broad classification of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Anonymous,
    Patron,
    Librarian,
    Administrator,
}

/// The authenticated (or anonymous) caller for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caller {
    /// User ID, absent for anonymous callers
    pub user_id: Option<Uuid>,

    /// Member of the "librarians" group
    pub is_librarian: bool,

    /// Staff / superuser flag
    pub is_admin: bool,
}

impl Caller {
    /// An unauthenticated caller
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            is_librarian: false,
            is_admin: false,
        }
    }

    /// A regular authenticated patron
    pub fn patron(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            is_librarian: false,
            is_admin: false,
        }
    }

    /// A member of the librarians group
    pub fn librarian(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            is_librarian: true,
            is_admin: false,
        }
    }

    /// A staff / superuser caller
    pub fn administrator(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            is_librarian: false,
            is_admin: true,
        }
    }

    pub fn role(&self) -> Role {
        if self.is_admin {
            Role::Administrator
        } else if self.is_librarian {
            Role::Librarian
        } else if self.user_id.is_some() {
            Role::Patron
        } else {
            Role::Anonymous
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Librarian or administrator: may manage the catalog and see all rentals
    pub fn is_staff(&self) -> bool {
        self.is_librarian || self.is_admin
    }

    /// Whether this caller is the given user
    pub fn is_self(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }
}
