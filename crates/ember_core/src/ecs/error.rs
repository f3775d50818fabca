//! Error types for the entity-component store.
//!
//! Recoverable failures are errors; programmer errors (stale entities,
//! double adds, missing components) are panics documented on the
//! offending operations.

use thiserror::Error;

/// Errors that can occur in the entity-component store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Hinted allocation collided with a live entity slot.
    #[error("entity slot {index} is already in use")]
    EntityAlreadyExists {
        /// The contested slot index.
        index: u32,
    },
}

/// Result type for store operations.
pub type EcsResult<T> = Result<T, EcsError>;
