//! Funding receipts

use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::Account;
use crate::card::Card;
use crate::transfer::{TransferId, TransferState};

/// Outcome of a funds movement that reached the target
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub transfer_id: TransferId,
    #[serde(serialize_with = "serialize_state")]
    pub state: TransferState,
    pub amount: Decimal,
    /// False while the card audit row is still outstanding
    pub audit_recorded: bool,
    /// Refreshed account list; absent if the refresh failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<Account>>,
    /// Refreshed card list; absent if the refresh failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<Card>>,
}

fn serialize_state<S: serde::Serializer>(
    state: &TransferState,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(state.as_str())
}

#[derive(Debug, Clone, Serialize)]
pub struct DepositReceipt {
    pub transfer_id: TransferId,
    pub amount: Decimal,
    pub account: Account,
}
