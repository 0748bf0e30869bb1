//! Card Adapter
//!
//! Moves funds in and out of a card balance through the [`CardStore`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use super::{BalanceAdapter, op_result};
use crate::card::CardStore;
use crate::ledger::LedgerEntry;
use crate::transfer::types::{OpResult, TransferId};

pub struct CardAdapter {
    cards: Arc<dyn CardStore>,
}

impl CardAdapter {
    pub fn new(cards: Arc<dyn CardStore>) -> Self {
        Self { cards }
    }
}

#[async_trait]
impl BalanceAdapter for CardAdapter {
    fn name(&self) -> &'static str {
        "Card"
    }

    async fn withdraw(&self, transfer_id: TransferId, card_id: i64, amount: Decimal) -> OpResult {
        debug!(transfer_id = %transfer_id, card_id, amount = %amount, "Card debit");
        let entry = LedgerEntry::debit(transfer_id, amount);
        let result = self.cards.apply(card_id, &entry).await;
        op_result(self.name(), entry.leg, transfer_id, result)
    }

    async fn deposit(&self, transfer_id: TransferId, card_id: i64, amount: Decimal) -> OpResult {
        debug!(transfer_id = %transfer_id, card_id, amount = %amount, "Card credit");
        let entry = LedgerEntry::credit(transfer_id, amount);
        let result = self.cards.apply(card_id, &entry).await;
        op_result(self.name(), entry.leg, transfer_id, result)
    }

    async fn rollback(&self, transfer_id: TransferId, card_id: i64, amount: Decimal) -> OpResult {
        debug!(transfer_id = %transfer_id, card_id, amount = %amount, "Card refund");
        let entry = LedgerEntry::refund(transfer_id, amount);
        let result = self.cards.apply(card_id, &entry).await;
        op_result(self.name(), entry.leg, transfer_id, result)
    }
}
