//! Cards
//!
//! Card balances, the card transaction audit log and card management.

pub mod models;
pub mod recorder;
pub mod repository;
pub mod service;

pub use models::{Card, CardStatus, CardTransaction, CardTxKind, CardTxStatus, NewCardTransaction};
pub use recorder::{PgTransactionRecorder, TransactionRecorder};
pub use repository::{CardStore, PgCardStore};
pub use service::{CardError, CardService};
