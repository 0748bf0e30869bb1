//! Transfer FSM
//!
//! Moves funds between balance holders (customer accounts and cards).
//!
//! # Architecture
//!
//! Every funds movement is a durable intent row in PostgreSQL (`transfers_tb`)
//! driven through a persistent FSM. Balance writes go through idempotent
//! ledger entries keyed by `(transfer_id, leg)`:
//! - **Accounts** (`accounts_tb`, checking or savings balance)
//! - **Cards** (`cards_tb`)
//!
//! # State Machine
//!
//! ```text
//! INIT → DEBIT_PENDING → DEBITED → CREDIT_PENDING → CREDITED → COMMITTED
//!              ↓                          ↓
//!           FAILED                 COMPENSATING → ROLLED_BACK
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Persist-Before-Call**: Always update DB state before touching a balance
//! 2. **Explicit Fail Rule**: Only compensate on an explicit failure, never on timeout/unknown
//! 3. **Idempotency**: All adapter operations are idempotent via `transfer_id`
//! 4. **Audit At-Least-Once**: `CREDITED` is retried until the card audit row exists

pub mod adapters;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod state;
pub mod types;
pub mod worker;

pub use coordinator::{CoordinatorConfig, TransferCoordinator};
pub use db::{IntentStore, PgIntentStore};
pub use error::TransferError;
pub use state::TransferState;
pub use types::{Endpoint, OpResult, TransferId, TransferRecord, TransferRequest};
pub use worker::{RecoveryWorker, WorkerConfig};
