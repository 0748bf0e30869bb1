//! Transfer handlers (wires between accounts, history)

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, StrictDecimal, ok};
use crate::funding::{DEFAULT_HISTORY_LIMIT, TransferReceipt};
use crate::session::Session;
use crate::transfer::{TransferId, TransferRecord};

/// Largest page accepted by the history endpoint
const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct WireRequest {
    pub from_account_id: i64,
    /// Display number of the receiving account
    pub to_account_number: String,
    pub amount: StrictDecimal,
    #[serde(default)]
    pub cid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// POST /api/v1/transfers
pub async fn create_wire(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<WireRequest>,
) -> ApiResult<TransferReceipt> {
    tracing::info!(
        user_id = session.user_id,
        from_account_id = req.from_account_id,
        amount = %req.amount.inner(),
        "Wire requested"
    );
    ok(state
        .funding
        .wire_transfer(
            &session,
            req.from_account_id,
            &req.to_account_number,
            req.amount.inner(),
            req.cid,
        )
        .await?)
}

/// GET /api/v1/transfers?limit=N
pub async fn list_transfers(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<TransferRecord>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    ok(state.funding.transfers(&session, limit).await?)
}

/// GET /api/v1/transfers/{id}
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(transfer_id): Path<String>,
) -> ApiResult<TransferRecord> {
    let transfer_id: TransferId = transfer_id
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid transfer_id format"))?;
    ok(state.funding.transfer(&session, transfer_id).await?)
}
