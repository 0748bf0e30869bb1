//! Customer accounts
//!
//! Checking/savings ledger rows and the accessor used to mutate them.

pub mod models;
pub mod repository;

pub use models::{Account, AccountType};
pub use repository::{AccountLedger, PgAccountLedger};
