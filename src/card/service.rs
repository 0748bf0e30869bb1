//! Card management
//!
//! Issue, freeze/unfreeze and inspect the session user's cards.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::models::{Card, CardTransaction};
use super::recorder::TransactionRecorder;
use super::repository::CardStore;
use crate::ledger::StoreError;
use crate::session::Session;

/// Longest accepted card label
pub const MAX_LABEL_LEN: usize = 40;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CardError {
    #[error("Card not found: {0}")]
    NotFound(i64),

    #[error("Card belongs to another user")]
    Forbidden,

    #[error("Invalid card label: {0}")]
    InvalidLabel(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CardError {
    pub fn code(&self) -> &'static str {
        match self {
            CardError::NotFound(_) => "CARD_NOT_FOUND",
            CardError::Forbidden => "FORBIDDEN",
            CardError::InvalidLabel(_) => "INVALID_LABEL",
            CardError::Store(StoreError::Unavailable(_)) => "SERVICE_UNAVAILABLE",
            CardError::Store(_) => "DATABASE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            CardError::NotFound(_) => 404,
            CardError::Forbidden => 403,
            CardError::InvalidLabel(_) => 400,
            CardError::Store(StoreError::Unavailable(_)) => 503,
            CardError::Store(_) => 500,
        }
    }
}

pub struct CardService {
    cards: Arc<dyn CardStore>,
    recorder: Arc<dyn TransactionRecorder>,
}

impl CardService {
    pub fn new(cards: Arc<dyn CardStore>, recorder: Arc<dyn TransactionRecorder>) -> Self {
        Self { cards, recorder }
    }

    /// Issue a new active card with a zero balance
    pub async fn issue_card(&self, session: &Session, label: &str) -> Result<Card, CardError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(CardError::InvalidLabel("label cannot be empty".to_string()));
        }
        if label.chars().count() > MAX_LABEL_LEN {
            return Err(CardError::InvalidLabel(format!(
                "label longer than {} characters",
                MAX_LABEL_LEN
            )));
        }

        let card = self.cards.issue(session.user_id, label).await?;
        info!(
            user_id = session.user_id,
            card_id = card.card_id,
            last_four = %card.last_four,
            "Card issued"
        );
        Ok(card)
    }

    pub async fn set_frozen(
        &self,
        session: &Session,
        card_id: i64,
        frozen: bool,
    ) -> Result<Card, CardError> {
        self.owned_card(session, card_id).await?;
        let card = self.cards.set_frozen(card_id, frozen).await?;
        info!(user_id = session.user_id, card_id, frozen, "Card freeze toggled");
        Ok(card)
    }

    pub async fn list_cards(&self, session: &Session) -> Result<Vec<Card>, CardError> {
        Ok(self.cards.list_by_owner(session.user_id).await?)
    }

    /// Transaction history of one card, newest first
    pub async fn card_transactions(
        &self,
        session: &Session,
        card_id: i64,
    ) -> Result<Vec<CardTransaction>, CardError> {
        self.owned_card(session, card_id).await?;
        Ok(self.recorder.list_for_card(card_id).await?)
    }

    async fn owned_card(&self, session: &Session, card_id: i64) -> Result<Card, CardError> {
        let card = self
            .cards
            .get(card_id)
            .await?
            .ok_or(CardError::NotFound(card_id))?;
        if card.owner_id != session.user_id {
            return Err(CardError::Forbidden);
        }
        Ok(card)
    }
}
