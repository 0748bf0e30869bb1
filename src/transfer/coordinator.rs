//! Transfer Coordinator
//!
//! Orchestrates the FSM-based transfer processing.
//! This is the central component that drives state transitions.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::adapters::BalanceAdapter;
use super::db::IntentStore;
use super::error::TransferError;
use super::state::TransferState;
use super::types::{Endpoint, OpResult, TransferId, TransferRecord, TransferRequest};
use crate::card::{NewCardTransaction, TransactionRecorder};

/// Limits for driving one transfer inline
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Upper bound on steps per `execute` call
    pub max_steps: usize,
    /// Consecutive steps without a state change before `execute` gives up
    /// and leaves the intent to the recovery worker
    pub max_stalls: usize,
    /// Pause after a step that made no progress
    pub retry_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            max_stalls: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Transfer Coordinator - orchestrates FSM-based processing
pub struct TransferCoordinator {
    intents: Arc<dyn IntentStore>,
    accounts: Arc<dyn BalanceAdapter>,
    cards: Arc<dyn BalanceAdapter>,
    recorder: Arc<dyn TransactionRecorder>,
    config: CoordinatorConfig,
}

impl TransferCoordinator {
    pub fn new(
        intents: Arc<dyn IntentStore>,
        accounts: Arc<dyn BalanceAdapter>,
        cards: Arc<dyn BalanceAdapter>,
        recorder: Arc<dyn TransactionRecorder>,
    ) -> Self {
        Self::with_config(intents, accounts, cards, recorder, CoordinatorConfig::default())
    }

    pub fn with_config(
        intents: Arc<dyn IntentStore>,
        accounts: Arc<dyn BalanceAdapter>,
        cards: Arc<dyn BalanceAdapter>,
        recorder: Arc<dyn TransactionRecorder>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            intents,
            accounts,
            cards,
            recorder,
            config,
        }
    }

    /// Persist a new transfer intent in INIT state
    ///
    /// Re-validates the request so internal callers cannot bypass the
    /// service layer. A repeated `cid` returns the original transfer id.
    pub async fn create(&self, req: TransferRequest) -> Result<TransferId, TransferError> {
        if req.amount <= rust_decimal::Decimal::ZERO {
            return Err(TransferError::InvalidAmount);
        }

        if req.source == req.target {
            return Err(TransferError::SameEndpoint);
        }

        if req.owner_id == 0 {
            return Err(TransferError::Forbidden);
        }

        // Card balances are never debited by a transfer
        if !matches!(req.source, Endpoint::Account(_)) {
            return Err(TransferError::UnsupportedSource(req.source.to_string()));
        }

        if let Some(ref cid) = req.cid
            && let Some(existing) = self.intents.get_by_cid(req.owner_id, cid).await?
        {
            debug!(cid = %cid, transfer_id = %existing.transfer_id, "Duplicate cid found");
            return Ok(existing.transfer_id);
        }

        let record = TransferRecord::new(TransferId::new(), req);
        let transfer_id = self.intents.create(&record).await?;
        info!(
            transfer_id = %transfer_id,
            owner_id = record.owner_id,
            amount = %record.amount,
            "Transfer created: {} -> {}", record.source, record.target
        );

        Ok(transfer_id)
    }

    /// Execute one step of the FSM
    ///
    /// Returns the new state after processing.
    /// Call repeatedly until a terminal state is reached.
    pub async fn step(&self, transfer_id: TransferId) -> Result<TransferState, TransferError> {
        let record = self
            .intents
            .get(transfer_id)
            .await?
            .ok_or_else(|| TransferError::TransferNotFound(transfer_id.to_string()))?;

        if record.state.is_terminal() {
            return Ok(record.state);
        }

        let new_state = match record.state {
            TransferState::Init => self.step_init(&record).await?,
            TransferState::DebitPending => self.debit_source(&record).await?,
            TransferState::Debited => self.step_debited(&record).await?,
            TransferState::CreditPending => self.credit_target(&record).await?,
            TransferState::Credited => self.step_credited(&record).await?,
            TransferState::Compensating => self.step_compensating(&record).await?,
            _ => record.state,
        };

        if !new_state.is_terminal() && new_state == record.state {
            self.intents.increment_retry(transfer_id).await?;
        }

        Ok(new_state)
    }

    /// Drive a transfer until it is terminal or stops making progress
    ///
    /// A stalled intent (unknown backend outcome, failing audit write or
    /// refund) is returned in its current state and finished by the
    /// recovery worker.
    pub async fn execute(&self, transfer_id: TransferId) -> Result<TransferState, TransferError> {
        self.drive(transfer_id, self.config.max_stalls, self.config.retry_delay)
            .await
    }

    /// Advance a transfer without waiting on a stalled step
    ///
    /// Used by the recovery worker: stops at the first step that makes no
    /// progress, leaving the intent for the next scan.
    pub async fn resume(&self, transfer_id: TransferId) -> Result<TransferState, TransferError> {
        self.drive(transfer_id, 1, Duration::ZERO).await
    }

    async fn drive(
        &self,
        transfer_id: TransferId,
        max_stalls: usize,
        retry_delay: Duration,
    ) -> Result<TransferState, TransferError> {
        let mut state = TransferState::Init;
        let mut stalls = 0;

        for i in 0..self.config.max_steps {
            let next = self.step(transfer_id).await?;

            if next.is_terminal() {
                debug!(
                    transfer_id = %transfer_id,
                    state = %next,
                    iterations = i + 1,
                    "Transfer completed"
                );
                return Ok(next);
            }

            if next == state {
                stalls += 1;
                if stalls >= max_stalls {
                    break;
                }
                tokio::time::sleep(retry_delay).await;
            } else {
                stalls = 0;
            }
            state = next;
        }

        warn!(
            transfer_id = %transfer_id,
            state = %state,
            "Transfer not finished inline, left to recovery worker"
        );
        Ok(state)
    }

    fn adapter_for(&self, endpoint: Endpoint) -> &dyn BalanceAdapter {
        match endpoint {
            Endpoint::Account(_) => self.accounts.as_ref(),
            Endpoint::Card(_) => self.cards.as_ref(),
        }
    }

    async fn current_state(&self, transfer_id: TransferId) -> Result<TransferState, TransferError> {
        match self.intents.get(transfer_id).await? {
            Some(r) => Ok(r.state),
            None => {
                error!(
                    transfer_id = %transfer_id,
                    "Transfer not found after CAS failure (data corruption?)"
                );
                Err(TransferError::TransferNotFound(transfer_id.to_string()))
            }
        }
    }

    /// CAS `from -> to`; if another worker got there first, report its state
    async fn settle(
        &self,
        transfer_id: TransferId,
        from: TransferState,
        to: TransferState,
        error: Option<&str>,
    ) -> Result<TransferState, TransferError> {
        let won = match error {
            Some(e) => {
                self.intents
                    .update_state_with_error(transfer_id, from, to, e)
                    .await?
            }
            None => self.intents.update_state_if(transfer_id, from, to).await?,
        };

        if won {
            Ok(to)
        } else {
            self.current_state(transfer_id).await
        }
    }

    /// Step from Init state: persist DebitPending, then debit the source
    async fn step_init(&self, record: &TransferRecord) -> Result<TransferState, TransferError> {
        if !self
            .intents
            .update_state_if(
                record.transfer_id,
                TransferState::Init,
                TransferState::DebitPending,
            )
            .await?
        {
            return self.current_state(record.transfer_id).await;
        }

        self.debit_source(record).await
    }

    /// Conditional debit of the source (idempotent on transfer id)
    async fn debit_source(&self, record: &TransferRecord) -> Result<TransferState, TransferError> {
        let result = self
            .adapter_for(record.source)
            .withdraw(record.transfer_id, record.source.id(), record.amount)
            .await;

        match result {
            OpResult::Success => {
                self.settle(
                    record.transfer_id,
                    TransferState::DebitPending,
                    TransferState::Debited,
                    None,
                )
                .await
            }
            OpResult::Failed(e) => {
                info!(transfer_id = %record.transfer_id, error = %e, "Debit rejected, nothing moved");
                self.settle(
                    record.transfer_id,
                    TransferState::DebitPending,
                    TransferState::Failed,
                    Some(&e),
                )
                .await
            }
            OpResult::Pending => Ok(TransferState::DebitPending),
        }
    }

    /// Step from Debited state: persist CreditPending, then credit the target
    ///
    /// CRITICAL: Funds are now IN-FLIGHT. Must reach terminal state.
    async fn step_debited(&self, record: &TransferRecord) -> Result<TransferState, TransferError> {
        if !self
            .intents
            .update_state_if(
                record.transfer_id,
                TransferState::Debited,
                TransferState::CreditPending,
            )
            .await?
        {
            return self.current_state(record.transfer_id).await;
        }

        self.credit_target(record).await
    }

    async fn credit_target(&self, record: &TransferRecord) -> Result<TransferState, TransferError> {
        let result = self
            .adapter_for(record.target)
            .deposit(record.transfer_id, record.target.id(), record.amount)
            .await;

        match result {
            OpResult::Success => {
                self.settle(
                    record.transfer_id,
                    TransferState::CreditPending,
                    TransferState::Credited,
                    None,
                )
                .await
            }
            OpResult::Failed(e) => {
                warn!(
                    transfer_id = %record.transfer_id,
                    error = %e,
                    "Target credit failed, compensating source"
                );
                self.settle(
                    record.transfer_id,
                    TransferState::CreditPending,
                    TransferState::Compensating,
                    Some(&e),
                )
                .await
            }
            // Unknown outcome: MUST NOT compensate, keep retrying
            OpResult::Pending => Ok(TransferState::CreditPending),
        }
    }

    /// Step from Credited state: write the card audit row, then commit
    async fn step_credited(&self, record: &TransferRecord) -> Result<TransferState, TransferError> {
        if let Endpoint::Card(card_id) = record.target {
            let tx = NewCardTransaction::payment(
                record.transfer_id,
                card_id,
                record.owner_id,
                record.amount,
            );
            if let Err(e) = self.recorder.record(&tx).await {
                warn!(
                    transfer_id = %record.transfer_id,
                    card_id,
                    error = %e,
                    "Audit write failed after funds moved (will retry)"
                );
                return Ok(TransferState::Credited);
            }
        }

        let state = self
            .settle(
                record.transfer_id,
                TransferState::Credited,
                TransferState::Committed,
                None,
            )
            .await?;
        if state == TransferState::Committed {
            info!(transfer_id = %record.transfer_id, "🔒 ATOMIC COMMIT SUCCESS");
        }
        Ok(state)
    }

    /// Step from Compensating state: refund the source
    async fn step_compensating(
        &self,
        record: &TransferRecord,
    ) -> Result<TransferState, TransferError> {
        let result = self
            .adapter_for(record.source)
            .rollback(record.transfer_id, record.source.id(), record.amount)
            .await;

        match result {
            OpResult::Success => {
                let state = self
                    .settle(
                        record.transfer_id,
                        TransferState::Compensating,
                        TransferState::RolledBack,
                        None,
                    )
                    .await?;
                info!(transfer_id = %record.transfer_id, "Transfer rolled back");
                Ok(state)
            }
            OpResult::Failed(e) => {
                warn!(
                    transfer_id = %record.transfer_id,
                    error = %e,
                    "Rollback failed (will retry)"
                );
                Ok(TransferState::Compensating)
            }
            OpResult::Pending => Ok(TransferState::Compensating),
        }
    }

    /// Get full transfer record
    pub async fn get(
        &self,
        transfer_id: TransferId,
    ) -> Result<Option<TransferRecord>, TransferError> {
        Ok(self.intents.get(transfer_id).await?)
    }

    /// Newest transfers of one owner
    pub async fn list_by_owner(
        &self,
        owner_id: i64,
        limit: usize,
    ) -> Result<Vec<TransferRecord>, TransferError> {
        Ok(self.intents.list_by_owner(owner_id, limit).await?)
    }

    /// Access to the intent store for the recovery worker
    pub fn intents(&self) -> &Arc<dyn IntentStore> {
        &self.intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountType;
    use crate::ledger::Leg;
    use crate::memory::{Fault, FaultPoint, InMemoryBank};
    use crate::transfer::adapters::{AccountAdapter, CardAdapter};
    use rust_decimal::Decimal;

    fn setup() -> (Arc<InMemoryBank>, TransferCoordinator) {
        let bank = Arc::new(InMemoryBank::new());
        let coordinator = TransferCoordinator::with_config(
            bank.clone(),
            Arc::new(AccountAdapter::new(bank.clone())),
            Arc::new(CardAdapter::new(bank.clone())),
            bank.clone(),
            CoordinatorConfig {
                max_steps: 20,
                max_stalls: 2,
                retry_delay: Duration::ZERO,
            },
        );
        (bank, coordinator)
    }

    fn usd(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (bank, coordinator) = setup();
        let account = bank.seed_account(1001, AccountType::Checking, usd(10_000));
        let card = bank.seed_card(1001, "Everyday", Decimal::ZERO);
        let src = Endpoint::Account(account.account_id);
        let dst = Endpoint::Card(card.card_id);

        let req = TransferRequest::new(1001, src, dst, Decimal::ZERO);
        assert_eq!(coordinator.create(req).await, Err(TransferError::InvalidAmount));

        let req = TransferRequest::new(1001, src, src, usd(100));
        assert_eq!(coordinator.create(req).await, Err(TransferError::SameEndpoint));

        let req = TransferRequest::new(1001, dst, src, usd(100));
        assert!(matches!(
            coordinator.create(req).await,
            Err(TransferError::UnsupportedSource(_))
        ));
    }

    #[tokio::test]
    async fn test_happy_path_commits_with_one_audit_row() {
        let (bank, coordinator) = setup();
        let account = bank.seed_account(1001, AccountType::Checking, usd(10_000));
        let card = bank.seed_card(1001, "Everyday", usd(500));

        let req = TransferRequest::new(
            1001,
            Endpoint::Account(account.account_id),
            Endpoint::Card(card.card_id),
            usd(3_000),
        );
        let id = coordinator.create(req).await.unwrap();
        let state = coordinator.execute(id).await.unwrap();

        assert_eq!(state, TransferState::Committed);
        assert_eq!(bank.account(account.account_id).unwrap().balance(), usd(7_000));
        assert_eq!(bank.card(card.card_id).unwrap().balance, usd(3_500));
        let rows = bank.card_transactions(card.card_id);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, usd(3_000));
        assert_eq!(rows[0].transfer_id, Some(id));
    }

    #[tokio::test]
    async fn test_debit_rejected_fails_without_mutation() {
        let (bank, coordinator) = setup();
        let account = bank.seed_account(1001, AccountType::Savings, usd(1_000));
        let card = bank.seed_card(1001, "Everyday", Decimal::ZERO);

        let req = TransferRequest::new(
            1001,
            Endpoint::Account(account.account_id),
            Endpoint::Card(card.card_id),
            usd(3_000),
        );
        let id = coordinator.create(req).await.unwrap();
        assert_eq!(coordinator.execute(id).await.unwrap(), TransferState::Failed);

        assert_eq!(bank.account(account.account_id).unwrap().balance(), usd(1_000));
        assert_eq!(bank.card(card.card_id).unwrap().balance, Decimal::ZERO);
        let record = coordinator.get(id).await.unwrap().unwrap();
        assert_eq!(record.error.as_deref(), Some("Insufficient balance"));
    }

    #[tokio::test]
    async fn test_credit_failure_compensates() {
        let (bank, coordinator) = setup();
        let account = bank.seed_account(1001, AccountType::Checking, usd(10_000));
        let card = bank.seed_card(1001, "Everyday", Decimal::ZERO);
        bank.inject(FaultPoint::Card(Leg::Credit), Fault::Reject);

        let req = TransferRequest::new(
            1001,
            Endpoint::Account(account.account_id),
            Endpoint::Card(card.card_id),
            usd(3_000),
        );
        let id = coordinator.create(req).await.unwrap();
        assert_eq!(coordinator.execute(id).await.unwrap(), TransferState::RolledBack);

        assert_eq!(bank.account(account.account_id).unwrap().balance(), usd(10_000));
        assert_eq!(bank.card(card.card_id).unwrap().balance, Decimal::ZERO);
        assert!(bank.card_transactions(card.card_id).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_credit_outcome_never_compensates() {
        let (bank, coordinator) = setup();
        let account = bank.seed_account(1001, AccountType::Checking, usd(10_000));
        let card = bank.seed_card(1001, "Everyday", Decimal::ZERO);
        bank.inject(FaultPoint::Card(Leg::Credit), Fault::Unavailable);

        let req = TransferRequest::new(
            1001,
            Endpoint::Account(account.account_id),
            Endpoint::Card(card.card_id),
            usd(3_000),
        );
        let id = coordinator.create(req).await.unwrap();
        assert_eq!(
            coordinator.execute(id).await.unwrap(),
            TransferState::CreditPending
        );
        assert_eq!(bank.account(account.account_id).unwrap().balance(), usd(7_000));

        bank.clear(FaultPoint::Card(Leg::Credit));
        assert_eq!(coordinator.execute(id).await.unwrap(), TransferState::Committed);
        assert_eq!(bank.card(card.card_id).unwrap().balance, usd(3_000));
    }

    #[tokio::test]
    async fn test_audit_failure_leaves_funds_moved() {
        let (bank, coordinator) = setup();
        let account = bank.seed_account(1001, AccountType::Checking, usd(10_000));
        let card = bank.seed_card(1001, "Everyday", Decimal::ZERO);
        bank.inject(FaultPoint::Audit, Fault::Unavailable);

        let req = TransferRequest::new(
            1001,
            Endpoint::Account(account.account_id),
            Endpoint::Card(card.card_id),
            usd(3_000),
        );
        let id = coordinator.create(req).await.unwrap();
        assert_eq!(coordinator.execute(id).await.unwrap(), TransferState::Credited);
        assert_eq!(bank.account(account.account_id).unwrap().balance(), usd(7_000));
        assert_eq!(bank.card(card.card_id).unwrap().balance, usd(3_000));
        assert!(bank.card_transactions(card.card_id).is_empty());

        bank.clear(FaultPoint::Audit);
        assert_eq!(coordinator.step(id).await.unwrap(), TransferState::Committed);
        // Replaying the committed intent writes nothing more
        assert_eq!(coordinator.step(id).await.unwrap(), TransferState::Committed);
        assert_eq!(bank.card_transactions(card.card_id).len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_cid_returns_original() {
        let (bank, coordinator) = setup();
        let account = bank.seed_account(1001, AccountType::Checking, usd(10_000));
        let card = bank.seed_card(1001, "Everyday", Decimal::ZERO);
        let req = TransferRequest::new(
            1001,
            Endpoint::Account(account.account_id),
            Endpoint::Card(card.card_id),
            usd(1_000),
        )
        .with_cid("fund-1");

        let first = coordinator.create(req.clone()).await.unwrap();
        coordinator.execute(first).await.unwrap();
        let second = coordinator.create(req).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(coordinator.execute(second).await.unwrap(), TransferState::Committed);
        assert_eq!(bank.account(account.account_id).unwrap().balance(), usd(9_000));
    }

    #[tokio::test]
    async fn test_account_to_account_commits_without_audit() {
        let (bank, coordinator) = setup();
        let from = bank.seed_account(1001, AccountType::Checking, usd(10_000));
        let to = bank.seed_account(2002, AccountType::Savings, Decimal::ZERO);

        let req = TransferRequest::new(
            1001,
            Endpoint::Account(from.account_id),
            Endpoint::Account(to.account_id),
            usd(2_500),
        );
        let id = coordinator.create(req).await.unwrap();
        assert_eq!(coordinator.execute(id).await.unwrap(), TransferState::Committed);
        assert_eq!(bank.account(from.account_id).unwrap().balance(), usd(7_500));
        assert_eq!(bank.account(to.account_id).unwrap().balance(), usd(2_500));
    }

    #[tokio::test]
    async fn test_step_unknown_transfer() {
        let (_bank, coordinator) = setup();
        assert!(matches!(
            coordinator.step(TransferId::new()).await,
            Err(TransferError::TransferNotFound(_))
        ));
    }
}
