//! Ledger entries and storage errors shared by every balance store.
//!
//! Each balance mutation is described by a [`LedgerEntry`] keyed by
//! `(transfer_id, leg)`. Stores apply an entry at most once: replaying the
//! same key returns the current row without touching the balance.

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use crate::transfer::types::TransferId;

/// Which side of a movement an entry represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum Leg {
    /// Funds leave the source
    Debit = 1,
    /// Funds arrive at the target
    Credit = 2,
    /// Compensation: funds return to the source
    Refund = 3,
    /// External money entering an account
    Deposit = 4,
}

impl Leg {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Leg::Debit),
            2 => Some(Leg::Credit),
            3 => Some(Leg::Refund),
            4 => Some(Leg::Deposit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Leg::Debit => "DEBIT",
            Leg::Credit => "CREDIT",
            Leg::Refund => "REFUND",
            Leg::Deposit => "DEPOSIT",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One idempotent balance mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub transfer_id: TransferId,
    pub leg: Leg,
    /// Signed change applied to the balance
    pub delta: Decimal,
}

impl LedgerEntry {
    pub fn debit(transfer_id: TransferId, amount: Decimal) -> Self {
        Self {
            transfer_id,
            leg: Leg::Debit,
            delta: -amount,
        }
    }

    pub fn credit(transfer_id: TransferId, amount: Decimal) -> Self {
        Self {
            transfer_id,
            leg: Leg::Credit,
            delta: amount,
        }
    }

    pub fn refund(transfer_id: TransferId, amount: Decimal) -> Self {
        Self {
            transfer_id,
            leg: Leg::Refund,
            delta: amount,
        }
    }

    pub fn deposit(transfer_id: TransferId, amount: Decimal) -> Self {
        Self {
            transfer_id,
            leg: Leg::Deposit,
            delta: amount,
        }
    }

    /// Key used for the idempotency check
    pub fn key(&self) -> (TransferId, Leg) {
        (self.transfer_id, self.leg)
    }
}

/// Errors returned by account, card, recorder and intent stores
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Card is frozen")]
    Frozen,

    #[error("Card is not active")]
    Inactive,

    /// The backend refused the write; nothing was applied
    #[error("Write rejected: {0}")]
    Rejected(String),

    /// The outcome of the call is unknown (timeout, connection loss)
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True when the write definitely did not happen.
    ///
    /// Only definite failures may trigger compensation.
    pub fn is_definite(&self) -> bool {
        !matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            sqlx::Error::Database(db) => StoreError::Rejected(db.to_string()),
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => StoreError::Rejected(e.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}
