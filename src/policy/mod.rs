//! Rental access policy
//!
//! Per-action authorization rules layered on the caller's capabilities.
//!
//! Matrix:
//!
//! | Action            | Anonymous | Patron       | Librarian | Admin |
//! |-------------------|-----------|--------------|-----------|-------|
//! | Create rental     | deny      | self only    | allow     | allow |
//! | Read rental       | deny      | own only     | allow     | allow |
//! | List rentals      | deny      | scoped self  | allow     | allow |
//! | Return rental     | deny      | deny         | allow     | allow |
//! | Delete rental     | deny      | deny         | allow     | allow |
//!
//! A patron reading another patron's rental gets a not-found, not a
//! forbidden, so the response does not reveal that the record exists.

use uuid::Uuid;

use crate::domain::Caller;
use crate::error::{AppError, AppResult};

/// May the caller create a rental naming `reader_id` as the reader?
pub fn authorize_create(caller: &Caller, reader_id: Uuid) -> AppResult<()> {
    if !caller.is_authenticated() {
        return Err(AppError::PermissionDenied);
    }
    if caller.is_staff() || caller.is_self(reader_id) {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "patrons may only check out books for themselves".to_string(),
    ))
}

/// May the caller list rentals at all? Scoping is decided separately via
/// [`Caller::is_staff`].
pub fn authorize_list(caller: &Caller) -> AppResult<()> {
    if caller.is_authenticated() {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

/// May the caller read the rental belonging to `reader_id`?
pub fn authorize_read(caller: &Caller, rental_id: Uuid, reader_id: Uuid) -> AppResult<()> {
    if !caller.is_authenticated() {
        return Err(AppError::PermissionDenied);
    }
    if caller.is_staff() || caller.is_self(reader_id) {
        return Ok(());
    }
    // Existence masking for cross-patron reads
    Err(AppError::RentalNotFound(rental_id.to_string()))
}

/// May the caller close (return) a rental?
pub fn authorize_return(caller: &Caller) -> AppResult<()> {
    if caller.is_staff() {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

/// May the caller delete a rental record?
pub fn authorize_delete(caller: &Caller) -> AppResult<()> {
    if caller.is_staff() {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

/// May the caller mutate the catalog (books, authors, genres)?
pub fn authorize_catalog_write(caller: &Caller) -> AppResult<()> {
    if caller.is_staff() {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

/// May the caller read authors/genres? Books are public; the reference
/// keeps author and genre records staff-only.
pub fn authorize_catalog_admin_read(caller: &Caller) -> AppResult<()> {
    if caller.is_staff() {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}
