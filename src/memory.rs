//! In-process backend
//!
//! Implements every storage trait on `DashMap`s so the service can run
//! without PostgreSQL (`postgres_url` unset) and so tests can exercise the
//! transfer FSM end to end. Faults can be injected per balance leg, for the
//! audit insert and for the intent store.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::account::repository::generate_account_number;
use crate::account::{Account, AccountLedger, AccountType};
use crate::admin::{UserChange, UserProfile, UserSource};
use crate::card::repository::{check_card_entry, generate_last_four};
use crate::card::{Card, CardStatus, CardStore, CardTransaction, NewCardTransaction, TransactionRecorder};
use crate::ledger::{Leg, LedgerEntry, StoreError};
use crate::transfer::db::IntentStore;
use crate::transfer::state::TransferState;
use crate::transfer::types::{TransferId, TransferRecord};

const DEFAULT_FEED_CAPACITY: usize = 256;

/// Where an injected fault fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Account(Leg),
    Card(Leg),
    /// Card transaction insert
    Audit,
    /// Any intent store write
    Intents,
}

/// How an injected fault fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Definite failure, nothing applied
    Reject,
    /// Outcome unknown to the caller
    Unavailable,
}

impl Fault {
    fn to_error(self, point: FaultPoint) -> StoreError {
        match self {
            Fault::Reject => StoreError::Rejected(format!("injected fault at {:?}", point)),
            Fault::Unavailable => StoreError::Unavailable(format!("injected fault at {:?}", point)),
        }
    }
}

pub struct InMemoryBank {
    accounts: DashMap<i64, Account>,
    cards: DashMap<i64, Card>,
    applied: DashMap<(TransferId, Leg), i64>,
    card_txs: DashMap<i64, CardTransaction>,
    audited: DashMap<TransferId, i64>,
    intents: DashMap<TransferId, TransferRecord>,
    cids: DashMap<(i64, String), TransferId>,
    users: DashMap<i64, UserProfile>,
    user_feed: Mutex<Option<broadcast::Sender<UserChange>>>,
    faults: DashMap<FaultPoint, Fault>,
    next_id: AtomicI64,
    calls: AtomicUsize,
}

impl Default for InMemoryBank {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Backend whose user change feed buffers at most `capacity` events
    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            accounts: DashMap::new(),
            cards: DashMap::new(),
            applied: DashMap::new(),
            card_txs: DashMap::new(),
            audited: DashMap::new(),
            intents: DashMap::new(),
            cids: DashMap::new(),
            users: DashMap::new(),
            user_feed: Mutex::new(Some(tx)),
            faults: DashMap::new(),
            next_id: AtomicI64::new(1),
            calls: AtomicUsize::new(0),
        }
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Count a trait call and fire an injected fault, if any
    fn call(&self, point: Option<FaultPoint>) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match point.and_then(|p| self.faults.get(&p).map(|f| (p, *f))) {
            Some((p, fault)) => Err(fault.to_error(p)),
            None => Ok(()),
        }
    }

    // === Fault injection ===

    pub fn inject(&self, point: FaultPoint, fault: Fault) {
        self.faults.insert(point, fault);
    }

    pub fn clear(&self, point: FaultPoint) {
        self.faults.remove(&point);
    }

    pub fn clear_all(&self) {
        self.faults.clear();
    }

    /// Number of storage trait calls served so far
    pub fn backend_calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    // === Seeding and inspection (bypass call counting) ===

    pub fn seed_account(&self, owner_id: i64, account_type: AccountType, balance: Decimal) -> Account {
        let mut account = Account {
            account_id: self.next_id(),
            owner_id,
            account_type,
            checking_balance: Decimal::ZERO,
            savings_balance: Decimal::ZERO,
            account_number: generate_account_number(),
            created_at: Utc::now(),
        };
        *account.balance_mut() = balance;
        self.accounts.insert(account.account_id, account.clone());
        account
    }

    pub fn seed_card(&self, owner_id: i64, label: &str, balance: Decimal) -> Card {
        let card = Card {
            card_id: self.next_id(),
            owner_id,
            label: label.to_string(),
            last_four: generate_last_four(),
            balance,
            frozen: false,
            status: CardStatus::Active,
            created_at: Utc::now(),
        };
        self.cards.insert(card.card_id, card.clone());
        card
    }

    pub fn account(&self, account_id: i64) -> Option<Account> {
        self.accounts.get(&account_id).map(|a| a.clone())
    }

    pub fn card(&self, card_id: i64) -> Option<Card> {
        self.cards.get(&card_id).map(|c| c.clone())
    }

    /// Overwrite a balance behind the caller's back (stale cache scenarios)
    pub fn set_account_balance(&self, account_id: i64, balance: Decimal) {
        if let Some(mut account) = self.accounts.get_mut(&account_id) {
            *account.balance_mut() = balance;
        }
    }

    pub fn set_card_status(&self, card_id: i64, status: CardStatus) {
        if let Some(mut card) = self.cards.get_mut(&card_id) {
            card.status = status;
        }
    }

    /// Audit rows for a card, newest first
    pub fn card_transactions(&self, card_id: i64) -> Vec<CardTransaction> {
        let mut rows: Vec<CardTransaction> = self
            .card_txs
            .iter()
            .filter(|t| t.card_id == card_id)
            .map(|t| t.clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.tx_id.cmp(&a.tx_id)));
        rows
    }

    pub fn intent(&self, transfer_id: TransferId) -> Option<TransferRecord> {
        self.intents.get(&transfer_id).map(|r| r.clone())
    }

    // === Users ===

    fn publish(&self, change: UserChange) {
        let feed = self.user_feed.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = feed.as_ref() {
            let _ = tx.send(change);
        }
    }

    pub fn upsert_user(&self, user: UserProfile) {
        let change = match self.users.insert(user.user_id, user.clone()) {
            Some(_) => UserChange::Update { user },
            None => UserChange::Insert { user },
        };
        self.publish(change);
    }

    pub fn remove_user(&self, user_id: i64) {
        if self.users.remove(&user_id).is_some() {
            self.publish(UserChange::Delete { user_id });
        }
    }

    /// Sender side of the user change feed, while it is open
    pub fn user_feed(&self) -> Option<broadcast::Sender<UserChange>> {
        self.user_feed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// New receiver on the user change feed
    ///
    /// Returns a receiver that is already closed once the feed was closed.
    pub fn subscribe_users(&self) -> broadcast::Receiver<UserChange> {
        match self.user_feed() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Drop the feed sender so subscribers see the end of the stream
    pub fn close_user_feed(&self) {
        self.user_feed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}

#[async_trait]
impl AccountLedger for InMemoryBank {
    async fn get(&self, account_id: i64) -> Result<Option<Account>, StoreError> {
        self.call(None)?;
        Ok(self.account(account_id))
    }

    async fn find_by_number(&self, account_number: &str) -> Result<Option<Account>, StoreError> {
        self.call(None)?;
        Ok(self
            .accounts
            .iter()
            .find(|a| a.account_number == account_number)
            .map(|a| a.clone()))
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Account>, StoreError> {
        self.call(None)?;
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .filter(|a| a.owner_id == owner_id)
            .map(|a| a.clone())
            .collect();
        accounts.sort_by_key(|a| a.account_id);
        Ok(accounts)
    }

    async fn open(&self, owner_id: i64, account_type: AccountType) -> Result<Account, StoreError> {
        self.call(None)?;
        Ok(self.seed_account(owner_id, account_type, Decimal::ZERO))
    }

    async fn apply(&self, account_id: i64, entry: &LedgerEntry) -> Result<Account, StoreError> {
        self.call(Some(FaultPoint::Account(entry.leg)))?;

        let mut account = self
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", account_id)))?;

        if self.applied.contains_key(&entry.key()) {
            return Ok(account.clone());
        }

        let balance = account.balance_mut();
        if *balance + entry.delta < Decimal::ZERO {
            return Err(StoreError::InsufficientBalance);
        }
        *balance += entry.delta;
        self.applied.insert(entry.key(), account_id);
        Ok(account.clone())
    }
}

#[async_trait]
impl CardStore for InMemoryBank {
    async fn get(&self, card_id: i64) -> Result<Option<Card>, StoreError> {
        self.call(None)?;
        Ok(self.card(card_id))
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Card>, StoreError> {
        self.call(None)?;
        let mut cards: Vec<Card> = self
            .cards
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .map(|c| c.clone())
            .collect();
        cards.sort_by_key(|c| c.card_id);
        Ok(cards)
    }

    async fn issue(&self, owner_id: i64, label: &str) -> Result<Card, StoreError> {
        self.call(None)?;
        Ok(self.seed_card(owner_id, label, Decimal::ZERO))
    }

    async fn set_frozen(&self, card_id: i64, frozen: bool) -> Result<Card, StoreError> {
        self.call(None)?;
        let mut card = self
            .cards
            .get_mut(&card_id)
            .ok_or_else(|| StoreError::NotFound(format!("card {}", card_id)))?;
        card.frozen = frozen;
        Ok(card.clone())
    }

    async fn apply(&self, card_id: i64, entry: &LedgerEntry) -> Result<Card, StoreError> {
        self.call(Some(FaultPoint::Card(entry.leg)))?;

        let mut card = self
            .cards
            .get_mut(&card_id)
            .ok_or_else(|| StoreError::NotFound(format!("card {}", card_id)))?;

        if self.applied.contains_key(&entry.key()) {
            return Ok(card.clone());
        }

        check_card_entry(&card, entry)?;
        card.balance += entry.delta;
        self.applied.insert(entry.key(), card_id);
        Ok(card.clone())
    }
}

#[async_trait]
impl TransactionRecorder for InMemoryBank {
    async fn record(&self, tx: &NewCardTransaction) -> Result<(), StoreError> {
        self.call(Some(FaultPoint::Audit))?;

        let tx_id = match tx.transfer_id {
            Some(transfer_id) => match self.audited.entry(transfer_id) {
                Entry::Occupied(_) => return Ok(()),
                Entry::Vacant(slot) => *slot.insert(self.next_id()),
            },
            None => self.next_id(),
        };
        self.card_txs
            .insert(tx_id, CardTransaction::from_new(tx_id, tx.clone()));
        Ok(())
    }

    async fn list_for_card(&self, card_id: i64) -> Result<Vec<CardTransaction>, StoreError> {
        self.call(None)?;
        Ok(self.card_transactions(card_id))
    }
}

#[async_trait]
impl IntentStore for InMemoryBank {
    async fn create(&self, record: &TransferRecord) -> Result<TransferId, StoreError> {
        self.call(Some(FaultPoint::Intents))?;

        if let Some(cid) = &record.cid {
            match self.cids.entry((record.owner_id, cid.clone())) {
                Entry::Occupied(existing) => return Ok(*existing.get()),
                Entry::Vacant(slot) => {
                    slot.insert(record.transfer_id);
                }
            }
        }
        self.intents.insert(record.transfer_id, record.clone());
        Ok(record.transfer_id)
    }

    async fn get(&self, transfer_id: TransferId) -> Result<Option<TransferRecord>, StoreError> {
        self.call(None)?;
        Ok(self.intent(transfer_id))
    }

    async fn get_by_cid(
        &self,
        owner_id: i64,
        cid: &str,
    ) -> Result<Option<TransferRecord>, StoreError> {
        self.call(None)?;
        Ok(self
            .cids
            .get(&(owner_id, cid.to_string()))
            .and_then(|id| self.intent(*id)))
    }

    async fn update_state_if(
        &self,
        transfer_id: TransferId,
        expected: TransferState,
        new_state: TransferState,
    ) -> Result<bool, StoreError> {
        self.call(Some(FaultPoint::Intents))?;
        match self.intents.get_mut(&transfer_id) {
            Some(mut record) if record.state == expected => {
                record.state = new_state;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_state_with_error(
        &self,
        transfer_id: TransferId,
        expected: TransferState,
        new_state: TransferState,
        error: &str,
    ) -> Result<bool, StoreError> {
        self.call(Some(FaultPoint::Intents))?;
        match self.intents.get_mut(&transfer_id) {
            Some(mut record) if record.state == expected => {
                record.state = new_state;
                record.error = Some(error.to_string());
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_retry(&self, transfer_id: TransferId) -> Result<(), StoreError> {
        self.call(Some(FaultPoint::Intents))?;
        if let Some(mut record) = self.intents.get_mut(&transfer_id) {
            record.retry_count += 1;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_stale(
        &self,
        threshold: Duration,
        limit: usize,
    ) -> Result<Vec<TransferRecord>, StoreError> {
        self.call(None)?;
        let Some(cutoff) = chrono::Duration::from_std(threshold)
            .ok()
            .and_then(|d| Utc::now().checked_sub_signed(d))
        else {
            return Ok(Vec::new());
        };

        let mut stale: Vec<TransferRecord> = self
            .intents
            .iter()
            .filter(|r| !r.state.is_terminal() && r.updated_at <= cutoff)
            .map(|r| r.clone())
            .collect();
        stale.sort_by_key(|r| r.updated_at);
        stale.truncate(limit);
        Ok(stale)
    }

    async fn list_by_owner(
        &self,
        owner_id: i64,
        limit: usize,
    ) -> Result<Vec<TransferRecord>, StoreError> {
        self.call(None)?;
        let mut records: Vec<TransferRecord> = self
            .intents
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.clone())
            .collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.transfer_id.cmp(&a.transfer_id))
        });
        records.truncate(limit);
        Ok(records)
    }
}

#[async_trait]
impl UserSource for InMemoryBank {
    async fn snapshot(&self) -> Result<Vec<UserProfile>, StoreError> {
        self.call(None)?;
        Ok(self.users.iter().map(|u| u.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_account_entry_applied_once() {
        let bank = InMemoryBank::new();
        let account = bank.seed_account(1, AccountType::Checking, Decimal::new(5_000, 2));
        let entry = LedgerEntry::debit(TransferId::new(), Decimal::new(1_000, 2));

        let first = AccountLedger::apply(&bank, account.account_id, &entry).await.unwrap();
        let replay = AccountLedger::apply(&bank, account.account_id, &entry).await.unwrap();
        assert_eq!(first.balance(), Decimal::new(4_000, 2));
        assert_eq!(replay.balance(), Decimal::new(4_000, 2));
    }

    #[tokio::test]
    async fn test_conditional_debit() {
        let bank = InMemoryBank::new();
        let account = bank.seed_account(1, AccountType::Savings, Decimal::new(500, 2));
        let entry = LedgerEntry::debit(TransferId::new(), Decimal::new(501, 2));

        let result = AccountLedger::apply(&bank, account.account_id, &entry).await;
        assert_eq!(result, Err(StoreError::InsufficientBalance));
        assert_eq!(bank.account(account.account_id).unwrap().savings_balance, Decimal::new(500, 2));

        // Rejected entry is not remembered; a later identical write can succeed
        bank.set_account_balance(account.account_id, Decimal::new(600, 2));
        assert!(AccountLedger::apply(&bank, account.account_id, &entry).await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_faults_and_call_count() {
        let bank = InMemoryBank::new();
        let card = bank.seed_card(1, "Travel", Decimal::ZERO);
        let entry = LedgerEntry::credit(TransferId::new(), Decimal::ONE);

        bank.inject(FaultPoint::Card(Leg::Credit), Fault::Unavailable);
        let err = CardStore::apply(&bank, card.card_id, &entry).await.unwrap_err();
        assert!(!err.is_definite());

        bank.inject(FaultPoint::Card(Leg::Credit), Fault::Reject);
        let err = CardStore::apply(&bank, card.card_id, &entry).await.unwrap_err();
        assert!(err.is_definite());

        bank.clear_all();
        assert!(CardStore::apply(&bank, card.card_id, &entry).await.is_ok());
        assert_eq!(bank.backend_calls(), 3);
    }

    #[tokio::test]
    async fn test_audit_insert_idempotent() {
        let bank = InMemoryBank::new();
        let id = TransferId::new();
        let tx = NewCardTransaction::payment(id, 4, 1, Decimal::TEN);

        bank.record(&tx).await.unwrap();
        bank.record(&tx).await.unwrap();
        assert_eq!(bank.card_transactions(4).len(), 1);
    }

    #[tokio::test]
    async fn test_cas_update() {
        use crate::transfer::types::{Endpoint, TransferRequest};

        let bank = InMemoryBank::new();
        let record = TransferRecord::new(
            TransferId::new(),
            TransferRequest::new(1, Endpoint::Account(1), Endpoint::Card(2), Decimal::ONE),
        );
        let id = bank.create(&record).await.unwrap();

        assert!(bank
            .update_state_if(id, TransferState::Init, TransferState::DebitPending)
            .await
            .unwrap());
        assert!(!bank
            .update_state_if(id, TransferState::Init, TransferState::DebitPending)
            .await
            .unwrap());
        assert_eq!(bank.intent(id).unwrap().state, TransferState::DebitPending);
    }
}
