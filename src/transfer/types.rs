//! Transfer Core Types
//!
//! Type definitions for the funds-movement FSM.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::state::TransferState;

/// Transfer ID - ULID-based unique identifier
///
/// Monotonic and sortable, generated without coordination between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(ulid::Ulid);

impl TransferId {
    /// Generate a new unique TransferId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Get the inner ULID value
    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

impl Serialize for TransferId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Kind of balance holder a transfer touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum EndpointKind {
    /// Account ledger (`accounts_tb`)
    Account = 1,
    /// Card balance (`cards_tb`)
    Card = 2,
}

impl EndpointKind {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(EndpointKind::Account),
            2 => Some(EndpointKind::Card),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Account => "ACCOUNT",
            EndpointKind::Card => "CARD",
        }
    }
}

/// Source or target of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Account(i64),
    Card(i64),
}

impl Endpoint {
    pub fn kind(&self) -> EndpointKind {
        match self {
            Endpoint::Account(_) => EndpointKind::Account,
            Endpoint::Card(_) => EndpointKind::Card,
        }
    }

    /// Row identifier inside the endpoint's store
    pub fn id(&self) -> i64 {
        match self {
            Endpoint::Account(id) | Endpoint::Card(id) => *id,
        }
    }

    /// Rebuild from the (kind, id) pair stored in PostgreSQL
    pub fn from_parts(kind: i16, id: i64) -> Option<Self> {
        match EndpointKind::from_id(kind)? {
            EndpointKind::Account => Some(Endpoint::Account(id)),
            EndpointKind::Card => Some(Endpoint::Card(id)),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.id())
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Operation result from balance adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpResult {
    /// Operation completed successfully
    Success,
    /// Operation failed with explicit error (safe to rollback)
    Failed(String),
    /// Operation state unknown (timeout, network error) - must retry
    Pending,
}

/// Transfer request from the service layer
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Session user (must own the source)
    pub owner_id: i64,
    pub source: Endpoint,
    pub target: Endpoint,
    pub amount: Decimal,
    /// Client-provided idempotency key (optional)
    pub cid: Option<String>,
}

impl TransferRequest {
    pub fn new(owner_id: i64, source: Endpoint, target: Endpoint, amount: Decimal) -> Self {
        Self {
            owner_id,
            source,
            target,
            amount,
            cid: None,
        }
    }

    /// Attach a client idempotency key
    pub fn with_cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }
}

/// Durable transfer intent
#[derive(Debug, Clone, Serialize)]
pub struct TransferRecord {
    pub transfer_id: TransferId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    pub owner_id: i64,
    pub source: Endpoint,
    pub target: Endpoint,
    pub amount: Decimal,
    #[serde(serialize_with = "serialize_state")]
    pub state: TransferState,
    /// Last error message (for debugging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn serialize_state<S: Serializer>(state: &TransferState, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(state.as_str())
}

impl TransferRecord {
    /// Create a new transfer record in INIT state
    pub fn new(transfer_id: TransferId, req: TransferRequest) -> Self {
        let now = Utc::now();
        Self {
            transfer_id,
            cid: req.cid,
            owner_id: req.owner_id,
            source: req.source,
            target: req.target,
            amount: req.amount,
            state: TransferState::Init,
            error: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Display for TransferRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transfer[{}] {} -> {} owner={} amount={} state={}",
            self.transfer_id, self.source, self.target, self.owner_id, self.amount, self.state
        )
    }
}
