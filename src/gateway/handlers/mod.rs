//! HTTP handlers

pub mod account;
pub mod admin;
pub mod card;
pub mod health;
pub mod session;
pub mod transfer;

pub use account::{deposit, list_accounts, open_account};
pub use admin::list_users;
pub use card::{card_transactions, freeze_card, fund_card, issue_card, list_cards, unfreeze_card};
pub use health::health_check;
pub use session::{logout, open_session};
#[cfg(feature = "mock-api")]
pub use session::mock_session;
pub use transfer::{create_wire, get_transfer, list_transfers};
