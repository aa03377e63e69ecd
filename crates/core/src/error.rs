//! Domain-level error taxonomy shared across crates.

use crate::types::DbId;

/// Errors produced by domain logic, independent of any transport.
///
/// The api crate maps each variant to an HTTP status in its `AppError`
/// `IntoResponse` impl.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: String, id: DbId },

    /// Input failed validation before reaching any store.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or invalid identity.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Valid identity, insufficient rights.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}
