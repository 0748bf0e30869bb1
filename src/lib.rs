//! Retail Banking Core
//!
//! Card funding, account transfers, deposits, card management and the
//! admin user directory, built on a persistent transfer FSM.
//!
//! # Modules
//!
//! - [`money`] - Amount parsing and validation
//! - [`ledger`] - Idempotent ledger entries and storage errors
//! - [`account`] - Customer accounts and the account ledger accessor
//! - [`card`] - Cards, the card balance accessor and the transaction recorder
//! - [`transfer`] - Transfer FSM, coordinator and recovery worker
//! - [`funding`] - Card funding, wires and deposits
//! - [`session`] - Per-user session context
//! - [`admin`] - Real-time user directory
//! - [`memory`] - In-memory backend with fault injection
//! - [`backend`] - Storage backend selection
//! - [`gateway`] - HTTP API

pub mod account;
pub mod admin;
pub mod backend;
pub mod card;
pub mod config;
pub mod db;
pub mod funding;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod memory;
pub mod money;
pub mod session;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{Account, AccountType};
pub use card::{Card, CardTransaction};
pub use funding::{FundingError, FundingService, TransferReceipt, ValidationError};
pub use memory::InMemoryBank;
pub use session::{Role, Session, SessionRegistry};
pub use transfer::{TransferCoordinator, TransferId, TransferState};
