//! In-memory domain stores backed by [`crate::storage::Storage`].
//!
//! Mutations update memory first, then queue persistence and publish on the
//! shared [`crate::changes::ChangeFeed`]. Callers get a [`PendingWrite`]
//! wherever a store writes its own key.

pub mod auth;
pub mod habit;
pub mod notification;
pub mod progress;
pub mod root;
pub mod settings;
pub mod task;

use crate::error::AppError;
use crate::storage::PendingWrite;

/// A value produced by a mutation plus the handle of the write it queued.
pub struct Mutation<T> {
    pub value: T,
    pub persisted: PendingWrite,
}

impl<T> Mutation<T> {
    pub fn new(value: T, persisted: PendingWrite) -> Self {
        Self { value, persisted }
    }
}

pub(crate) fn ensure_non_empty(label: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{label} cannot be empty")));
    }
    Ok(())
}
