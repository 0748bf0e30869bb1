//! Balance Adapters
//!
//! Adapters for the two kinds of balance holders a transfer can touch
//! (accounts and cards). All adapters must be idempotent using transfer_id.

pub mod account;
pub mod card;

pub use account::AccountAdapter;
pub use card::CardAdapter;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;

use super::types::{OpResult, TransferId};
use crate::ledger::{Leg, StoreError};

/// Balance adapter trait
///
/// All methods MUST be idempotent - calling with the same transfer_id
/// multiple times must have the same effect as calling once.
#[async_trait]
pub trait BalanceAdapter: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    /// Take funds out of the holder (debit)
    async fn withdraw(&self, transfer_id: TransferId, holder_id: i64, amount: Decimal)
    -> OpResult;

    /// Put funds into the holder (credit)
    async fn deposit(&self, transfer_id: TransferId, holder_id: i64, amount: Decimal)
    -> OpResult;

    /// Refund a previous withdraw
    ///
    /// Only called during compensation when the target credit failed.
    async fn rollback(&self, transfer_id: TransferId, holder_id: i64, amount: Decimal)
    -> OpResult;
}

/// Translate a store outcome into the FSM's three-way result
///
/// Definite failures are safe to compensate; anything else is `Pending`.
pub(crate) fn op_result<T>(
    adapter: &'static str,
    leg: Leg,
    transfer_id: TransferId,
    result: Result<T, StoreError>,
) -> OpResult {
    match result {
        Ok(_) => OpResult::Success,
        Err(e) if e.is_definite() => {
            warn!(transfer_id = %transfer_id, adapter, leg = %leg, error = %e, "Balance write failed");
            OpResult::Failed(e.to_string())
        }
        Err(e) => {
            warn!(transfer_id = %transfer_id, adapter, leg = %leg, error = %e, "Balance write outcome unknown");
            OpResult::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_result_mapping() {
        let id = TransferId::new();
        assert_eq!(
            op_result("test", Leg::Debit, id, Ok::<(), StoreError>(())),
            OpResult::Success
        );
        assert_eq!(
            op_result::<()>("test", Leg::Debit, id, Err(StoreError::InsufficientBalance)),
            OpResult::Failed("Insufficient balance".to_string())
        );
        assert_eq!(
            op_result::<()>("test", Leg::Credit, id, Err(StoreError::Unavailable("timeout".into()))),
            OpResult::Pending
        );
    }
}
