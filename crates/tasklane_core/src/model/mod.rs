//! Domain model for the session/sync layer.
//!
//! # Responsibility
//! - Define typed shapes for rows exchanged with the remote backend.
//! - Define draft/patch shapes for insert and partial-update requests.
//!
//! # Invariants
//! - Every entity row carries the owning `user_id`; ownership is enforced by
//!   the backend, never re-validated here.
//! - Embedded relations are read-time snapshots, not live references.

pub mod project;
pub mod task;
pub mod user;

/// Serde helper for patch fields that distinguish "leave untouched" (`None`)
/// from "clear the column" (`Some(None)`).
pub(crate) fn is_untouched<T>(value: &Option<T>) -> bool {
    value.is_none()
}
