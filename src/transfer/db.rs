//! Transfer Intent Store
//!
//! Durable persistence for FSM transfer state.
//! All state updates use atomic CAS (Compare-And-Swap) operations.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Duration;

use super::state::TransferState;
use super::types::{Endpoint, TransferId, TransferRecord};
use crate::ledger::StoreError;

/// Storage operations on transfer intents
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Persist a new intent in INIT state
    ///
    /// Idempotent on `(owner_id, cid)`: if an intent with the same client key
    /// exists, its id is returned and nothing is inserted.
    async fn create(&self, record: &TransferRecord) -> Result<TransferId, StoreError>;

    async fn get(&self, transfer_id: TransferId) -> Result<Option<TransferRecord>, StoreError>;

    async fn get_by_cid(
        &self,
        owner_id: i64,
        cid: &str,
    ) -> Result<Option<TransferRecord>, StoreError>;

    /// Update state only if the current state matches `expected`
    ///
    /// Returns false if another worker moved the intent first.
    async fn update_state_if(
        &self,
        transfer_id: TransferId,
        expected: TransferState,
        new_state: TransferState,
    ) -> Result<bool, StoreError>;

    /// CAS update that also stores the failure reason
    async fn update_state_with_error(
        &self,
        transfer_id: TransferId,
        expected: TransferState,
        new_state: TransferState,
        error: &str,
    ) -> Result<bool, StoreError>;

    async fn increment_retry(&self, transfer_id: TransferId) -> Result<(), StoreError>;

    /// Non-terminal intents not updated within `threshold`, oldest first
    async fn find_stale(
        &self,
        threshold: Duration,
        limit: usize,
    ) -> Result<Vec<TransferRecord>, StoreError>;

    /// Newest first
    async fn list_by_owner(
        &self,
        owner_id: i64,
        limit: usize,
    ) -> Result<Vec<TransferRecord>, StoreError>;
}

const TRANSFER_COLUMNS: &str = "transfer_id, cid, owner_id, source_kind, source_id, \
     target_kind, target_id, amount, state, error_message, retry_count, created_at, updated_at";

/// PostgreSQL-backed [`IntentStore`]
pub struct PgIntentStore {
    pool: PgPool,
}

impl PgIntentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &PgRow) -> Result<TransferRecord, StoreError> {
        let transfer_id_str: String = row.try_get("transfer_id")?;
        let transfer_id: TransferId = transfer_id_str
            .parse()
            .map_err(|_| StoreError::Rejected(format!("Invalid transfer_id: {}", transfer_id_str)))?;

        let state_id: i16 = row.try_get("state")?;
        let state = TransferState::from_id(state_id)
            .ok_or_else(|| StoreError::Rejected(format!("Invalid state ID: {}", state_id)))?;

        let source = Endpoint::from_parts(row.try_get("source_kind")?, row.try_get("source_id")?)
            .ok_or_else(|| StoreError::Rejected("Invalid source endpoint".to_string()))?;
        let target = Endpoint::from_parts(row.try_get("target_kind")?, row.try_get("target_id")?)
            .ok_or_else(|| StoreError::Rejected("Invalid target endpoint".to_string()))?;

        Ok(TransferRecord {
            transfer_id,
            cid: row.try_get("cid")?,
            owner_id: row.try_get("owner_id")?,
            source,
            target,
            amount: row.try_get("amount")?,
            state,
            error: row.try_get("error_message")?,
            retry_count: row.try_get("retry_count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl IntentStore for PgIntentStore {
    async fn create(&self, record: &TransferRecord) -> Result<TransferId, StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO transfers_tb
                (transfer_id, cid, owner_id, source_kind, source_id, target_kind, target_id,
                 amount, state, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
            ON CONFLICT (owner_id, cid) DO NOTHING
            RETURNING transfer_id
            "#,
        )
        .bind(record.transfer_id.to_string())
        .bind(&record.cid)
        .bind(record.owner_id)
        .bind(record.source.kind().id())
        .bind(record.source.id())
        .bind(record.target.kind().id())
        .bind(record.target.id())
        .bind(record.amount)
        .bind(record.state.id())
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            return Ok(record.transfer_id);
        }

        // Conflict on (owner_id, cid): hand back the original intent
        let cid = record.cid.as_deref().unwrap_or_default();
        let existing = self
            .get_by_cid(record.owner_id, cid)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("transfer with cid {}", cid)))?;
        tracing::info!(
            transfer_id = %existing.transfer_id,
            cid = %cid,
            "Transfer with cid already exists - returning existing record (idempotent)"
        );
        Ok(existing.transfer_id)
    }

    async fn get(&self, transfer_id: TransferId) -> Result<Option<TransferRecord>, StoreError> {
        let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers_tb WHERE transfer_id = $1");
        let row = sqlx::query(&sql)
            .bind(transfer_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn get_by_cid(
        &self,
        owner_id: i64,
        cid: &str,
    ) -> Result<Option<TransferRecord>, StoreError> {
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers_tb WHERE owner_id = $1 AND cid = $2"
        );
        let row = sqlx::query(&sql)
            .bind(owner_id)
            .bind(cid)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn update_state_if(
        &self,
        transfer_id: TransferId,
        expected: TransferState,
        new_state: TransferState,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE transfers_tb
            SET state = $1, updated_at = NOW()
            WHERE transfer_id = $2 AND state = $3
            "#,
        )
        .bind(new_state.id())
        .bind(transfer_id.to_string())
        .bind(expected.id())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_state_with_error(
        &self,
        transfer_id: TransferId,
        expected: TransferState,
        new_state: TransferState,
        error: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE transfers_tb
            SET state = $1, error_message = $2, updated_at = NOW()
            WHERE transfer_id = $3 AND state = $4
            "#,
        )
        .bind(new_state.id())
        .bind(error)
        .bind(transfer_id.to_string())
        .bind(expected.id())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_retry(&self, transfer_id: TransferId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE transfers_tb
            SET retry_count = retry_count + 1, updated_at = NOW()
            WHERE transfer_id = $1
            "#,
        )
        .bind(transfer_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_stale(
        &self,
        threshold: Duration,
        limit: usize,
    ) -> Result<Vec<TransferRecord>, StoreError> {
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers_tb \
             WHERE state = ANY($1) \
               AND updated_at < NOW() - INTERVAL '1 second' * $2 \
             ORDER BY updated_at ASC \
             LIMIT $3"
        );
        let rows = sqlx::query(&sql)
            .bind(TransferState::active_ids().to_vec())
            .bind(threshold.as_secs() as i64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn list_by_owner(
        &self,
        owner_id: i64,
        limit: usize,
    ) -> Result<Vec<TransferRecord>, StoreError> {
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers_tb WHERE owner_id = $1 \
             ORDER BY created_at DESC LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_record).collect()
    }
}
