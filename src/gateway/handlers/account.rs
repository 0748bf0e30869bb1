//! Account handlers

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;

use super::super::state::AppState;
use super::super::types::{ApiResult, StrictDecimal, ok};
use crate::account::{Account, AccountType};
use crate::funding::DepositReceipt;
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub account_type: AccountType,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: StrictDecimal,
}

/// GET /api/v1/accounts
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<Account>> {
    ok(state.funding.accounts(&session).await?)
}

/// POST /api/v1/accounts
pub async fn open_account(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<OpenAccountRequest>,
) -> ApiResult<Account> {
    ok(state.funding.open_account(&session, req.account_type).await?)
}

/// POST /api/v1/accounts/{id}/deposit
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(account_id): Path<i64>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<DepositReceipt> {
    ok(state
        .funding
        .deposit(&session, account_id, req.amount.inner())
        .await?)
}
