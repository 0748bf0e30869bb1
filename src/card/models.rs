//! Data models for cards and card transactions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use thiserror::Error;

use crate::transfer::types::TransferId;

#[derive(Debug, Error)]
#[error("Unknown {kind} id: {id}")]
pub struct UnknownCode {
    pub kind: &'static str,
    pub id: i16,
}

/// Card lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum CardStatus {
    Active = 1,
    Inactive = 2,
    Cancelled = 3,
}

impl CardStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }
}

impl TryFrom<i16> for CardStatus {
    type Error = UnknownCode;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CardStatus::Active),
            2 => Ok(CardStatus::Inactive),
            3 => Ok(CardStatus::Cancelled),
            id => Err(UnknownCode {
                kind: "card status",
                id,
            }),
        }
    }
}

/// Card row
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Card {
    pub card_id: i64,
    pub owner_id: i64,
    pub label: String,
    pub last_four: String,
    /// Spendable balance
    pub balance: Decimal,
    pub frozen: bool,
    #[sqlx(try_from = "i16")]
    pub status: CardStatus,
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// Whether the card may receive funds right now
    pub fn accepts_funds(&self) -> bool {
        !self.frozen && self.status == CardStatus::Active
    }
}

/// Kind of card transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum CardTxKind {
    /// Card funded from an account
    Payment = 1,
    Purchase = 2,
    Refund = 3,
}

impl CardTxKind {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }
}

impl TryFrom<i16> for CardTxKind {
    type Error = UnknownCode;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CardTxKind::Payment),
            2 => Ok(CardTxKind::Purchase),
            3 => Ok(CardTxKind::Refund),
            id => Err(UnknownCode {
                kind: "card transaction kind",
                id,
            }),
        }
    }
}

impl fmt::Display for CardTxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CardTxKind::Payment => "payment",
            CardTxKind::Purchase => "purchase",
            CardTxKind::Refund => "refund",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum CardTxStatus {
    Completed = 1,
    Pending = 2,
    Failed = 3,
}

impl CardTxStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }
}

impl TryFrom<i16> for CardTxStatus {
    type Error = UnknownCode;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CardTxStatus::Completed),
            2 => Ok(CardTxStatus::Pending),
            3 => Ok(CardTxStatus::Failed),
            id => Err(UnknownCode {
                kind: "card transaction status",
                id,
            }),
        }
    }
}

/// Audit row to append
#[derive(Debug, Clone, PartialEq)]
pub struct NewCardTransaction {
    /// Funds movement this row describes; at most one row per transfer
    pub transfer_id: Option<TransferId>,
    pub card_id: i64,
    pub owner_id: i64,
    pub amount: Decimal,
    pub kind: CardTxKind,
    pub status: CardTxStatus,
    pub created_at: DateTime<Utc>,
}

impl NewCardTransaction {
    /// Completed `payment` row for a card funding transfer
    pub fn payment(transfer_id: TransferId, card_id: i64, owner_id: i64, amount: Decimal) -> Self {
        Self {
            transfer_id: Some(transfer_id),
            card_id,
            owner_id,
            amount,
            kind: CardTxKind::Payment,
            status: CardTxStatus::Completed,
            created_at: Utc::now(),
        }
    }
}

/// Stored audit row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardTransaction {
    pub tx_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<TransferId>,
    pub card_id: i64,
    pub owner_id: i64,
    pub amount: Decimal,
    pub kind: CardTxKind,
    pub status: CardTxStatus,
    pub created_at: DateTime<Utc>,
}

impl CardTransaction {
    pub fn from_new(tx_id: i64, tx: NewCardTransaction) -> Self {
        Self {
            tx_id,
            transfer_id: tx.transfer_id,
            card_id: tx.card_id,
            owner_id: tx.owner_id,
            amount: tx.amount,
            kind: tx.kind,
            status: tx.status,
            created_at: tx.created_at,
        }
    }
}
