//! Funding errors
//!
//! Every failure a caller of [`FundingService`](super::FundingService) can
//! see, with a stable code and an HTTP status.

use thiserror::Error;

use crate::ledger::StoreError;
use crate::money::MoneyError;
use crate::transfer::{TransferError, TransferId};

/// Caller-side precondition failures. Nothing was written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please select an account")]
    NoAccountSelected,

    #[error("Please select a card")]
    NoCardSelected,

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Card is frozen")]
    CardFrozen,

    #[error("Card is not active")]
    CardInactive,

    #[error("Account or card belongs to another user")]
    Forbidden,

    #[error("Cannot transfer to the same account")]
    SameAccount,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Card not found: {0}")]
    CardNotFound(i64),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::NoAccountSelected => "NO_ACCOUNT_SELECTED",
            ValidationError::NoCardSelected => "NO_CARD_SELECTED",
            ValidationError::InvalidAmount(_) => "INVALID_AMOUNT",
            ValidationError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ValidationError::CardFrozen => "CARD_FROZEN",
            ValidationError::CardInactive => "CARD_INACTIVE",
            ValidationError::Forbidden => "FORBIDDEN",
            ValidationError::SameAccount => "SAME_ACCOUNT",
            ValidationError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            ValidationError::CardNotFound(_) => "CARD_NOT_FOUND",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ValidationError::Forbidden => 403,
            ValidationError::AccountNotFound(_) | ValidationError::CardNotFound(_) => 404,
            _ => 400,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FundingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The debit was refused; no balance changed. Safe to retry.
    #[error("Debit failed: {0}")]
    DebitFailed(String),

    /// The credit was refused after the debit. `rolled_back` tells whether
    /// the refund already landed or is still being retried.
    #[error("Credit failed: {reason}")]
    CreditFailed { reason: String, rolled_back: bool },

    /// Outcome not known yet; the recovery worker will finish it
    #[error("Transfer {0} is still in progress")]
    InProgress(TransferId),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FundingError {
    pub fn code(&self) -> &'static str {
        match self {
            FundingError::Validation(e) => e.code(),
            FundingError::DebitFailed(_) => "DEBIT_FAILED",
            FundingError::CreditFailed { .. } => "CREDIT_FAILED",
            FundingError::InProgress(_) => "IN_PROGRESS",
            FundingError::Transfer(e) => e.code(),
            FundingError::Store(StoreError::NotFound(_)) => "NOT_FOUND",
            FundingError::Store(StoreError::Unavailable(_)) => "SERVICE_UNAVAILABLE",
            FundingError::Store(_) => "DATABASE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            FundingError::Validation(e) => e.http_status(),
            FundingError::DebitFailed(_) => 422,
            FundingError::CreditFailed { .. } => 422,
            FundingError::InProgress(_) => 202,
            FundingError::Transfer(e) => e.http_status(),
            FundingError::Store(StoreError::NotFound(_)) => 404,
            FundingError::Store(StoreError::Unavailable(_)) => 503,
            FundingError::Store(_) => 500,
        }
    }
}
