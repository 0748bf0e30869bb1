//! Account Adapter
//!
//! Moves funds in and out of a customer account through the [`AccountLedger`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use super::{BalanceAdapter, op_result};
use crate::account::AccountLedger;
use crate::ledger::LedgerEntry;
use crate::transfer::types::{OpResult, TransferId};

pub struct AccountAdapter {
    ledger: Arc<dyn AccountLedger>,
}

impl AccountAdapter {
    pub fn new(ledger: Arc<dyn AccountLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl BalanceAdapter for AccountAdapter {
    fn name(&self) -> &'static str {
        "Account"
    }

    async fn withdraw(&self, transfer_id: TransferId, account_id: i64, amount: Decimal) -> OpResult {
        debug!(transfer_id = %transfer_id, account_id, amount = %amount, "Account debit");
        let entry = LedgerEntry::debit(transfer_id, amount);
        let result = self.ledger.apply(account_id, &entry).await;
        op_result(self.name(), entry.leg, transfer_id, result)
    }

    async fn deposit(&self, transfer_id: TransferId, account_id: i64, amount: Decimal) -> OpResult {
        debug!(transfer_id = %transfer_id, account_id, amount = %amount, "Account credit");
        let entry = LedgerEntry::credit(transfer_id, amount);
        let result = self.ledger.apply(account_id, &entry).await;
        op_result(self.name(), entry.leg, transfer_id, result)
    }

    async fn rollback(&self, transfer_id: TransferId, account_id: i64, amount: Decimal) -> OpResult {
        debug!(transfer_id = %transfer_id, account_id, amount = %amount, "Account refund");
        let entry = LedgerEntry::refund(transfer_id, amount);
        let result = self.ledger.apply(account_id, &entry).await;
        op_result(self.name(), entry.leg, transfer_id, result)
    }
}
