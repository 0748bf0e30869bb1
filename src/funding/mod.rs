//! Funding: card funding, wires between accounts and deposits

pub mod error;
pub mod service;
pub mod types;
pub mod validation;

pub use error::{FundingError, ValidationError};
pub use service::{DEFAULT_HISTORY_LIMIT, FundingService};
pub use types::{DepositReceipt, TransferReceipt};
pub use validation::{precheck_card_funding, precheck_wire};
