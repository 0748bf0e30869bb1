//! Funding Service
//!
//! Session-scoped entry points for moving money: card funding, wires
//! between accounts and deposits. Card funding and wires run through the
//! transfer FSM; deposits are a single idempotent ledger entry.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{FundingError, ValidationError};
use super::types::{DepositReceipt, TransferReceipt};
use super::validation::{precheck_card_funding, precheck_wire};
use crate::account::{Account, AccountLedger, AccountType};
use crate::card::{Card, CardStore};
use crate::ledger::LedgerEntry;
use crate::money::validate_amount;
use crate::session::Session;
use crate::transfer::{
    Endpoint, TransferCoordinator, TransferId, TransferRecord, TransferRequest, TransferState,
};

/// Default page size for transfer history
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

pub struct FundingService {
    accounts: Arc<dyn AccountLedger>,
    cards: Arc<dyn CardStore>,
    coordinator: Arc<TransferCoordinator>,
}

impl FundingService {
    pub fn new(
        accounts: Arc<dyn AccountLedger>,
        cards: Arc<dyn CardStore>,
        coordinator: Arc<TransferCoordinator>,
    ) -> Self {
        Self {
            accounts,
            cards,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &Arc<TransferCoordinator> {
        &self.coordinator
    }

    pub async fn accounts(&self, session: &Session) -> Result<Vec<Account>, FundingError> {
        Ok(self.accounts.list_by_owner(session.user_id).await?)
    }

    pub async fn open_account(
        &self,
        session: &Session,
        account_type: AccountType,
    ) -> Result<Account, FundingError> {
        let account = self.accounts.open(session.user_id, account_type).await?;
        info!(
            user_id = session.user_id,
            account_id = account.account_id,
            account_type = %account_type,
            "Account opened"
        );
        Ok(account)
    }

    /// Fund a card from an account using the caller's cached rows
    ///
    /// Preconditions are checked against `account` and `card` as the caller
    /// sees them; a failed precheck makes no backend call. The debit then
    /// re-validates the balance inside the write.
    pub async fn fund_card(
        &self,
        session: &Session,
        account: Option<&Account>,
        card: Option<&Card>,
        amount: Decimal,
        cid: Option<String>,
    ) -> Result<TransferReceipt, FundingError> {
        let amount = precheck_card_funding(session, account, card, amount)?;
        let (Some(account), Some(card)) = (account, card) else {
            // precheck guarantees both are selected
            return Err(ValidationError::NoAccountSelected.into());
        };

        let mut req = TransferRequest::new(
            session.user_id,
            Endpoint::Account(account.account_id),
            Endpoint::Card(card.card_id),
            amount,
        );
        req.cid = cid;

        self.run(session, req).await
    }

    /// Fund a card after loading both rows from the backend
    pub async fn fund_card_by_id(
        &self,
        session: &Session,
        account_id: i64,
        card_id: i64,
        amount: Decimal,
        cid: Option<String>,
    ) -> Result<TransferReceipt, FundingError> {
        let account = self
            .accounts
            .get(account_id)
            .await?
            .ok_or_else(|| ValidationError::AccountNotFound(account_id.to_string()))?;
        let card = self
            .cards
            .get(card_id)
            .await?
            .ok_or(ValidationError::CardNotFound(card_id))?;

        self.fund_card(session, Some(&account), Some(&card), amount, cid)
            .await
    }

    /// Wire money from one of the session user's accounts to any account
    pub async fn wire_transfer(
        &self,
        session: &Session,
        from_account_id: i64,
        to_account_number: &str,
        amount: Decimal,
        cid: Option<String>,
    ) -> Result<TransferReceipt, FundingError> {
        let from = self
            .accounts
            .get(from_account_id)
            .await?
            .ok_or_else(|| ValidationError::AccountNotFound(from_account_id.to_string()))?;
        let to = self
            .accounts
            .find_by_number(to_account_number)
            .await?
            .ok_or_else(|| ValidationError::AccountNotFound(to_account_number.to_string()))?;

        let amount = precheck_wire(session, &from, &to, amount)?;

        let mut req = TransferRequest::new(
            session.user_id,
            Endpoint::Account(from.account_id),
            Endpoint::Account(to.account_id),
            amount,
        );
        req.cid = cid;

        self.run(session, req).await
    }

    /// Credit external money to one of the session user's accounts
    pub async fn deposit(
        &self,
        session: &Session,
        account_id: i64,
        amount: Decimal,
    ) -> Result<DepositReceipt, FundingError> {
        let amount = validate_amount(amount).map_err(ValidationError::from)?;
        let account = self
            .accounts
            .get(account_id)
            .await?
            .ok_or_else(|| ValidationError::AccountNotFound(account_id.to_string()))?;
        if account.owner_id != session.user_id {
            return Err(ValidationError::Forbidden.into());
        }

        let transfer_id = TransferId::new();
        let account = self
            .accounts
            .apply(account_id, &LedgerEntry::deposit(transfer_id, amount))
            .await?;
        info!(
            transfer_id = %transfer_id,
            account_id,
            amount = %amount,
            "Deposit credited"
        );

        Ok(DepositReceipt {
            transfer_id,
            amount,
            account,
        })
    }

    pub async fn transfers(
        &self,
        session: &Session,
        limit: usize,
    ) -> Result<Vec<TransferRecord>, FundingError> {
        Ok(self
            .coordinator
            .list_by_owner(session.user_id, limit)
            .await?)
    }

    pub async fn transfer(
        &self,
        session: &Session,
        transfer_id: TransferId,
    ) -> Result<TransferRecord, FundingError> {
        match self.coordinator.get(transfer_id).await? {
            Some(record) if record.owner_id == session.user_id => Ok(record),
            Some(_) => Err(ValidationError::Forbidden.into()),
            None => Err(FundingError::Transfer(
                crate::transfer::TransferError::TransferNotFound(transfer_id.to_string()),
            )),
        }
    }

    /// Create, drive and report one transfer
    async fn run(
        &self,
        session: &Session,
        req: TransferRequest,
    ) -> Result<TransferReceipt, FundingError> {
        let transfer_id = self.coordinator.create(req).await?;
        let state = self.coordinator.execute(transfer_id).await?;
        let record = self
            .coordinator
            .get(transfer_id)
            .await?
            .ok_or_else(|| {
                crate::transfer::TransferError::TransferNotFound(transfer_id.to_string())
            })?;

        let audit_recorded = match state {
            TransferState::Committed => true,
            TransferState::Credited => {
                warn!(
                    transfer_id = %transfer_id,
                    amount = %record.amount,
                    "Funds moved but audit record missing, recovery worker will retry"
                );
                false
            }
            TransferState::Failed => {
                return Err(FundingError::DebitFailed(error_text(&record)));
            }
            TransferState::RolledBack => {
                return Err(FundingError::CreditFailed {
                    reason: error_text(&record),
                    rolled_back: true,
                });
            }
            TransferState::Compensating => {
                return Err(FundingError::CreditFailed {
                    reason: error_text(&record),
                    rolled_back: false,
                });
            }
            _ => return Err(FundingError::InProgress(transfer_id)),
        };

        let (accounts, cards) = self.refresh(session).await;
        Ok(TransferReceipt {
            transfer_id,
            state,
            amount: record.amount,
            audit_recorded,
            accounts,
            cards,
        })
    }

    /// Reload the owner's accounts and cards after a movement
    async fn refresh(&self, session: &Session) -> (Option<Vec<Account>>, Option<Vec<Card>>) {
        let accounts = match self.accounts.list_by_owner(session.user_id).await {
            Ok(accounts) => Some(accounts),
            Err(e) => {
                warn!(user_id = session.user_id, error = %e, "Account refresh failed");
                None
            }
        };
        let cards = match self.cards.list_by_owner(session.user_id).await {
            Ok(cards) => Some(cards),
            Err(e) => {
                warn!(user_id = session.user_id, error = %e, "Card refresh failed");
                None
            }
        };
        (accounts, cards)
    }
}

fn error_text(record: &TransferRecord) -> String {
    record
        .error
        .clone()
        .unwrap_or_else(|| "unknown error".to_string())
}
