//! Transfer Error Types

use thiserror::Error;

use crate::ledger::StoreError;

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("User does not own the source")]
    Forbidden,

    #[error("Source and target cannot be the same")]
    SameEndpoint,

    #[error("Unsupported transfer source: {0}")]
    UnsupportedSource(String),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    // === System Errors ===
    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Forbidden => "FORBIDDEN",
            TransferError::SameEndpoint => "SAME_ENDPOINT",
            TransferError::UnsupportedSource(_) => "UNSUPPORTED_SOURCE",
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            TransferError::DatabaseError(_) => "DATABASE_ERROR",
            TransferError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            TransferError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::Forbidden => 403,
            TransferError::SameEndpoint
            | TransferError::UnsupportedSource(_)
            | TransferError::InvalidAmount => 400,
            TransferError::TransferNotFound(_) => 404,
            TransferError::DatabaseError(_) | TransferError::InvalidStateTransition(_) => 500,
            TransferError::ServiceUnavailable(_) => 503,
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => TransferError::TransferNotFound(what),
            StoreError::Unavailable(msg) => TransferError::ServiceUnavailable(msg),
            other => TransferError::DatabaseError(other.to_string()),
        }
    }
}
