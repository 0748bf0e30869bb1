//! Transaction Recorder
//!
//! Append-only card transaction log. Inserts are idempotent per transfer id,
//! so a retried audit write never produces a second row.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::models::{CardTransaction, NewCardTransaction};
use crate::ledger::StoreError;

#[async_trait]
pub trait TransactionRecorder: Send + Sync {
    /// Append one audit row; replaying the same transfer id is a no-op
    async fn record(&self, tx: &NewCardTransaction) -> Result<(), StoreError>;

    /// Newest first
    async fn list_for_card(&self, card_id: i64) -> Result<Vec<CardTransaction>, StoreError>;
}

/// PostgreSQL-backed [`TransactionRecorder`]
pub struct PgTransactionRecorder {
    pool: PgPool,
}

impl PgTransactionRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_tx(row: &PgRow) -> Result<CardTransaction, StoreError> {
        let transfer_id = row
            .try_get::<Option<String>, _>("transfer_id")?
            .map(|s| {
                s.parse()
                    .map_err(|e| StoreError::Rejected(format!("bad transfer_id {}: {}", s, e)))
            })
            .transpose()?;
        let kind: i16 = row.try_get("kind")?;
        let status: i16 = row.try_get("status")?;

        Ok(CardTransaction {
            tx_id: row.try_get("tx_id")?,
            transfer_id,
            card_id: row.try_get("card_id")?,
            owner_id: row.try_get("owner_id")?,
            amount: row.try_get("amount")?,
            kind: kind
                .try_into()
                .map_err(|e: super::models::UnknownCode| StoreError::Rejected(e.to_string()))?,
            status: status
                .try_into()
                .map_err(|e: super::models::UnknownCode| StoreError::Rejected(e.to_string()))?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl TransactionRecorder for PgTransactionRecorder {
    async fn record(&self, tx: &NewCardTransaction) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO card_transactions_tb
                (transfer_id, card_id, owner_id, amount, kind, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (transfer_id) DO NOTHING
            "#,
        )
        .bind(tx.transfer_id.map(|id| id.to_string()))
        .bind(tx.card_id)
        .bind(tx.owner_id)
        .bind(tx.amount)
        .bind(tx.kind.id())
        .bind(tx.status.id())
        .bind(tx.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(card_id = tx.card_id, "Card transaction already recorded");
        }
        Ok(())
    }

    async fn list_for_card(&self, card_id: i64) -> Result<Vec<CardTransaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT tx_id, transfer_id, card_id, owner_id, amount, kind, status, created_at
            FROM card_transactions_tb
            WHERE card_id = $1
            ORDER BY created_at DESC, tx_id DESC
            "#,
        )
        .bind(card_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_tx).collect()
    }
}
