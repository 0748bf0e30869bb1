//! Card Balance Accessor
//!
//! Reads and writes a card's spendable balance; issues cards and toggles the
//! frozen flag.

use async_trait::async_trait;
use rand::Rng;
use sqlx::PgPool;

use super::models::Card;
use crate::ledger::{LedgerEntry, StoreError};
use crate::transfer::types::EndpointKind;

const CARD_COLUMNS: &str =
    "card_id, owner_id, label, last_four, balance, frozen, status, created_at";

/// Storage operations on cards
#[async_trait]
pub trait CardStore: Send + Sync {
    async fn get(&self, card_id: i64) -> Result<Option<Card>, StoreError>;

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Card>, StoreError>;

    /// Issue an active, unfrozen, zero-balance card
    async fn issue(&self, owner_id: i64, label: &str) -> Result<Card, StoreError>;

    async fn set_frozen(&self, card_id: i64, frozen: bool) -> Result<Card, StoreError>;

    /// Apply a ledger entry to the card balance
    ///
    /// Credits require an active, unfrozen card; debits require sufficient
    /// balance. Replays of an applied `(transfer_id, leg)` return the current row.
    async fn apply(&self, card_id: i64, entry: &LedgerEntry) -> Result<Card, StoreError>;
}

/// Random last four digits for a newly issued card
pub fn generate_last_four() -> String {
    format!("{:04}", rand::thread_rng().gen_range(0..10_000u16))
}

/// Check a ledger entry against the current card row
pub(crate) fn check_card_entry(card: &Card, entry: &LedgerEntry) -> Result<(), StoreError> {
    if entry.delta.is_sign_positive() {
        if card.frozen {
            return Err(StoreError::Frozen);
        }
        if !card.accepts_funds() {
            return Err(StoreError::Inactive);
        }
    } else if card.balance + entry.delta < rust_decimal::Decimal::ZERO {
        return Err(StoreError::InsufficientBalance);
    }
    Ok(())
}

/// PostgreSQL-backed [`CardStore`]
pub struct PgCardStore {
    pool: PgPool,
}

impl PgCardStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CardStore for PgCardStore {
    async fn get(&self, card_id: i64) -> Result<Option<Card>, StoreError> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards_tb WHERE card_id = $1");
        Ok(sqlx::query_as::<_, Card>(&sql)
            .bind(card_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Card>, StoreError> {
        let sql =
            format!("SELECT {CARD_COLUMNS} FROM cards_tb WHERE owner_id = $1 ORDER BY card_id");
        Ok(sqlx::query_as::<_, Card>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn issue(&self, owner_id: i64, label: &str) -> Result<Card, StoreError> {
        let sql = format!(
            "INSERT INTO cards_tb (owner_id, label, last_four) VALUES ($1, $2, $3) \
             RETURNING {CARD_COLUMNS}"
        );
        let card = sqlx::query_as::<_, Card>(&sql)
            .bind(owner_id)
            .bind(label)
            .bind(generate_last_four())
            .fetch_one(&self.pool)
            .await?;
        Ok(card)
    }

    async fn set_frozen(&self, card_id: i64, frozen: bool) -> Result<Card, StoreError> {
        let sql = format!(
            "UPDATE cards_tb SET frozen = $1 WHERE card_id = $2 RETURNING {CARD_COLUMNS}"
        );
        sqlx::query_as::<_, Card>(&sql)
            .bind(frozen)
            .bind(card_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("card {}", card_id)))
    }

    async fn apply(&self, card_id: i64, entry: &LedgerEntry) -> Result<Card, StoreError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {CARD_COLUMNS} FROM cards_tb WHERE card_id = $1 FOR UPDATE");
        let current = sqlx::query_as::<_, Card>(&sql)
            .bind(card_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("card {}", card_id)))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO ledger_entries_tb (transfer_id, leg, endpoint_kind, endpoint_id, delta)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (transfer_id, leg) DO NOTHING
            "#,
        )
        .bind(entry.transfer_id.to_string())
        .bind(entry.leg.id())
        .bind(EndpointKind::Card.id())
        .bind(card_id)
        .bind(entry.delta)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(current);
        }

        if let Err(e) = check_card_entry(&current, entry) {
            tx.rollback().await?;
            return Err(e);
        }

        let sql = format!(
            "UPDATE cards_tb SET balance = balance + $1 WHERE card_id = $2 RETURNING {CARD_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Card>(&sql)
            .bind(entry.delta)
            .bind(card_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }
}
