//! Card handlers

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;

use super::super::state::AppState;
use super::super::types::{ApiResult, StrictDecimal, ok};
use crate::card::{Card, CardTransaction};
use crate::funding::TransferReceipt;
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct IssueCardRequest {
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct FundCardRequest {
    /// Source account
    pub account_id: i64,
    pub amount: StrictDecimal,
    /// Client idempotency key
    #[serde(default)]
    pub cid: Option<String>,
}

/// GET /api/v1/cards
pub async fn list_cards(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<Card>> {
    ok(state.cards.list_cards(&session).await?)
}

/// POST /api/v1/cards
pub async fn issue_card(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<IssueCardRequest>,
) -> ApiResult<Card> {
    ok(state.cards.issue_card(&session, &req.label).await?)
}

/// POST /api/v1/cards/{id}/freeze
pub async fn freeze_card(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(card_id): Path<i64>,
) -> ApiResult<Card> {
    ok(state.cards.set_frozen(&session, card_id, true).await?)
}

/// POST /api/v1/cards/{id}/unfreeze
pub async fn unfreeze_card(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(card_id): Path<i64>,
) -> ApiResult<Card> {
    ok(state.cards.set_frozen(&session, card_id, false).await?)
}

/// POST /api/v1/cards/{id}/fund
///
/// Moves money from one of the caller's accounts onto the card.
pub async fn fund_card(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(card_id): Path<i64>,
    Json(req): Json<FundCardRequest>,
) -> ApiResult<TransferReceipt> {
    tracing::info!(
        user_id = session.user_id,
        card_id,
        account_id = req.account_id,
        amount = %req.amount.inner(),
        "Card funding requested"
    );
    ok(state
        .funding
        .fund_card_by_id(&session, req.account_id, card_id, req.amount.inner(), req.cid)
        .await?)
}

/// GET /api/v1/cards/{id}/transactions
pub async fn card_transactions(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(card_id): Path<i64>,
) -> ApiResult<Vec<CardTransaction>> {
    ok(state.cards.card_transactions(&session, card_id).await?)
}
