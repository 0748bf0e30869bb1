use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;

use retail_banking::account::{Account, AccountType};
use retail_banking::admin::{UserChange, UserDirectory, UserProfile};
use retail_banking::card::{Card, CardTxKind};
use retail_banking::funding::{FundingError, FundingService, ValidationError};
use retail_banking::ledger::Leg;
use retail_banking::memory::{Fault, FaultPoint, InMemoryBank};
use retail_banking::session::{Role, Session, SessionError, SessionRegistry};
use retail_banking::transfer::adapters::{AccountAdapter, CardAdapter};
use retail_banking::transfer::{
    CoordinatorConfig, RecoveryWorker, TransferCoordinator, TransferState, WorkerConfig,
};

const OWNER: i64 = 1001;

struct Bank {
    store: Arc<InMemoryBank>,
    funding: FundingService,
    worker: RecoveryWorker,
    session: Session,
}

/// Fresh bank with one customer session; no retry delays, recovery sees everything as stale
fn bank() -> Bank {
    let store = Arc::new(InMemoryBank::new());
    let coordinator = Arc::new(TransferCoordinator::with_config(
        store.clone(),
        Arc::new(AccountAdapter::new(store.clone())),
        Arc::new(CardAdapter::new(store.clone())),
        store.clone(),
        CoordinatorConfig {
            max_steps: 20,
            max_stalls: 1,
            retry_delay: Duration::ZERO,
        },
    ));
    let worker = RecoveryWorker::new(
        coordinator.clone(),
        WorkerConfig {
            scan_interval: Duration::from_secs(1),
            stale_threshold: Duration::ZERO,
            batch_size: 10,
        },
    );
    let funding = FundingService::new(store.clone(), store.clone(), coordinator);
    let session = SessionRegistry::new(chrono::Duration::minutes(5)).open(OWNER, Role::Customer);

    Bank {
        store,
        funding,
        worker,
        session,
    }
}

fn usd(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

impl Bank {
    fn checking(&self, cents: i64) -> Account {
        self.store.seed_account(OWNER, AccountType::Checking, usd(cents))
    }

    fn card(&self, cents: i64) -> Card {
        self.store.seed_card(OWNER, "Everyday", usd(cents))
    }

    fn account_balance(&self, account: &Account) -> Decimal {
        self.store.account(account.account_id).unwrap().balance()
    }

    fn card_balance(&self, card: &Card) -> Decimal {
        self.store.card(card.card_id).unwrap().balance
    }
}

#[tokio::test]
async fn qa_tc_valid_funding_moves_money_and_records_once() {
    let bank = bank();
    let account = bank.checking(10_000);
    let card = bank.card(1_250);

    let receipt = bank
        .funding
        .fund_card(&bank.session, Some(&account), Some(&card), usd(3_000), None)
        .await
        .unwrap();

    assert_eq!(receipt.state, TransferState::Committed);
    assert!(receipt.audit_recorded);
    assert_eq!(bank.account_balance(&account), usd(7_000));
    assert_eq!(bank.card_balance(&card), usd(4_250));

    let rows = bank.store.card_transactions(card.card_id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount, usd(3_000));
    assert_eq!(rows[0].kind, CardTxKind::Payment);

    // Receipt carries the refreshed lists
    let accounts = receipt.accounts.unwrap();
    assert_eq!(accounts[0].balance(), usd(7_000));
    assert_eq!(receipt.cards.unwrap()[0].balance, usd(4_250));
}

#[tokio::test]
async fn qa_tc_insufficient_balance_makes_no_backend_call() {
    let bank = bank();
    let account = bank.checking(2_000);
    let card = bank.card(0);
    let calls_before = bank.store.backend_calls();

    let err = bank
        .funding
        .fund_card(&bank.session, Some(&account), Some(&card), usd(3_000), None)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FundingError::Validation(ValidationError::InsufficientBalance)
    );
    assert_eq!(err.to_string(), "Insufficient balance");
    assert_eq!(bank.store.backend_calls(), calls_before);
    assert_eq!(bank.account_balance(&account), usd(2_000));
    assert_eq!(bank.card_balance(&card), Decimal::ZERO);
    assert!(bank.store.card_transactions(card.card_id).is_empty());
}

#[tokio::test]
async fn qa_tc_missing_selection_and_bad_amounts() {
    let bank = bank();
    let account = bank.checking(10_000);
    let card = bank.card(0);

    let err = bank
        .funding
        .fund_card(&bank.session, None, Some(&card), usd(100), None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Please select an account");

    let err = bank
        .funding
        .fund_card(&bank.session, Some(&account), None, usd(100), None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        FundingError::Validation(ValidationError::NoCardSelected)
    );

    for amount in [Decimal::ZERO, usd(-500), Decimal::new(1, 3)] {
        let err = bank
            .funding
            .fund_card(&bank.session, Some(&account), Some(&card), amount, None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, FundingError::Validation(ValidationError::InvalidAmount(_))),
            "{} should be rejected, got {:?}",
            amount,
            err
        );
    }
    assert_eq!(bank.account_balance(&account), usd(10_000));
}

#[tokio::test]
async fn qa_tc_credit_failure_restores_account() {
    let bank = bank();
    let account = bank.checking(10_000);
    let card = bank.card(0);
    bank.store.inject(FaultPoint::Card(Leg::Credit), Fault::Reject);

    let err = bank
        .funding
        .fund_card(&bank.session, Some(&account), Some(&card), usd(3_000), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FundingError::CreditFailed {
            rolled_back: true,
            ..
        }
    ));
    assert_eq!(bank.account_balance(&account), usd(10_000));
    assert_eq!(bank.card_balance(&card), Decimal::ZERO);
    assert!(bank.store.card_transactions(card.card_id).is_empty());
}

#[tokio::test]
async fn qa_tc_audit_failure_keeps_balances_and_recovers_once() {
    let bank = bank();
    let account = bank.checking(10_000);
    let card = bank.card(0);
    bank.store.inject(FaultPoint::Audit, Fault::Unavailable);

    let receipt = bank
        .funding
        .fund_card(&bank.session, Some(&account), Some(&card), usd(3_000), None)
        .await
        .unwrap();

    // Balance changes stand, audit row outstanding
    assert_eq!(receipt.state, TransferState::Credited);
    assert!(!receipt.audit_recorded);
    assert_eq!(bank.account_balance(&account), usd(7_000));
    assert_eq!(bank.card_balance(&card), usd(3_000));
    assert!(bank.store.card_transactions(card.card_id).is_empty());

    bank.store.clear(FaultPoint::Audit);
    assert_eq!(bank.worker.scan_and_recover().await.unwrap(), 1);
    // A second sweep finds nothing left to do
    assert_eq!(bank.worker.scan_and_recover().await.unwrap(), 0);

    assert_eq!(
        bank.store.intent(receipt.transfer_id).unwrap().state,
        TransferState::Committed
    );
    let rows = bank.store.card_transactions(card.card_id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount, usd(3_000));
    assert_eq!(bank.card_balance(&card), usd(3_000));
}

#[tokio::test]
async fn qa_tc_stale_cache_debit_refused_without_mutation() {
    let bank = bank();
    let cached = bank.checking(10_000);
    let card = bank.card(0);
    // Another channel spent most of it since the list was loaded
    bank.store.set_account_balance(cached.account_id, usd(1_000));

    let err = bank
        .funding
        .fund_card(&bank.session, Some(&cached), Some(&card), usd(3_000), None)
        .await
        .unwrap_err();

    assert!(matches!(err, FundingError::DebitFailed(_)));
    assert_eq!(bank.account_balance(&cached), usd(1_000));
    assert_eq!(bank.card_balance(&card), Decimal::ZERO);
    assert!(bank.store.card_transactions(card.card_id).is_empty());
}

#[tokio::test]
async fn qa_tc_unknown_credit_outcome_never_compensates() {
    let bank = bank();
    let account = bank.checking(10_000);
    let card = bank.card(0);
    bank.store.inject(FaultPoint::Card(Leg::Credit), Fault::Unavailable);

    let err = bank
        .funding
        .fund_card(&bank.session, Some(&account), Some(&card), usd(3_000), None)
        .await
        .unwrap_err();
    let FundingError::InProgress(transfer_id) = err else {
        panic!("expected InProgress, got {:?}", err);
    };

    // Debited, not refunded
    assert_eq!(
        bank.store.intent(transfer_id).unwrap().state,
        TransferState::CreditPending
    );
    assert_eq!(bank.account_balance(&account), usd(7_000));

    bank.store.clear(FaultPoint::Card(Leg::Credit));
    assert_eq!(bank.worker.scan_and_recover().await.unwrap(), 1);

    assert_eq!(
        bank.store.intent(transfer_id).unwrap().state,
        TransferState::Committed
    );
    assert_eq!(bank.account_balance(&account), usd(7_000));
    assert_eq!(bank.card_balance(&card), usd(3_000));
    assert_eq!(bank.store.card_transactions(card.card_id).len(), 1);
}

#[tokio::test]
async fn qa_tc_refund_failure_completed_by_worker() {
    let bank = bank();
    let account = bank.checking(10_000);
    let card = bank.card(0);
    bank.store.inject(FaultPoint::Card(Leg::Credit), Fault::Reject);
    bank.store.inject(FaultPoint::Account(Leg::Refund), Fault::Unavailable);

    let err = bank
        .funding
        .fund_card(&bank.session, Some(&account), Some(&card), usd(3_000), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FundingError::CreditFailed {
            rolled_back: false,
            ..
        }
    ));
    assert_eq!(bank.account_balance(&account), usd(7_000));

    bank.store.clear(FaultPoint::Account(Leg::Refund));
    assert_eq!(bank.worker.scan_and_recover().await.unwrap(), 1);
    assert_eq!(bank.account_balance(&account), usd(10_000));
    assert_eq!(bank.card_balance(&card), Decimal::ZERO);
}

#[tokio::test]
async fn qa_tc_duplicate_cid_debits_once() {
    let bank = bank();
    let account = bank.checking(10_000);
    let card = bank.card(0);

    let first = bank
        .funding
        .fund_card(
            &bank.session,
            Some(&account),
            Some(&card),
            usd(3_000),
            Some("client-42".to_string()),
        )
        .await
        .unwrap();
    let second = bank
        .funding
        .fund_card(
            &bank.session,
            Some(&account),
            Some(&card),
            usd(3_000),
            Some("client-42".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(first.transfer_id, second.transfer_id);
    assert_eq!(bank.account_balance(&account), usd(7_000));
    assert_eq!(bank.card_balance(&card), usd(3_000));
    assert_eq!(bank.store.card_transactions(card.card_id).len(), 1);
}

#[test]
fn qa_tc_logged_out_session_rejected() {
    let registry = SessionRegistry::new(chrono::Duration::minutes(5));
    let session = registry.open(OWNER, Role::Customer);
    assert_eq!(registry.resolve(&session.session_id).unwrap(), session);

    assert!(registry.logout(&session.session_id));
    assert_eq!(
        registry.resolve(&session.session_id),
        Err(SessionError::Unknown)
    );
    // Second logout is a no-op
    assert!(!registry.logout(&session.session_id));
}

#[tokio::test]
async fn qa_tc_directory_follows_changes_and_reloads_on_lag() {
    let store = Arc::new(InMemoryBank::with_feed_capacity(1));
    let profile = |user_id: i64, name: &str| UserProfile {
        user_id,
        full_name: name.to_string(),
        email: format!("{}@bank.test", user_id),
        role: Role::Customer,
        created_at: Utc::now(),
    };
    store.upsert_user(profile(1, "Ada"));

    let directory = UserDirectory::new(store.clone());
    assert_eq!(directory.reload().await.unwrap(), 1);

    directory
        .apply(UserChange::Insert {
            user: profile(2, "Grace"),
        })
        .await;
    directory
        .apply(UserChange::Update {
            user: profile(1, "Ada L."),
        })
        .await;
    directory.apply(UserChange::Delete { user_id: 2 }).await;
    assert_eq!(directory.len().await, 1);
    assert_eq!(directory.get(1).await.unwrap().full_name, "Ada L.");

    // Overflow the feed before the sync loop reads it: it must reload
    let feed = store.subscribe_users();
    store.upsert_user(profile(3, "Linus"));
    store.upsert_user(profile(4, "Barbara"));
    store.close_user_feed();
    directory.sync(feed).await;

    let ids: Vec<i64> = directory.list().await.iter().map(|u| u.user_id).collect();
    assert!(ids.contains(&3) && ids.contains(&4), "got {:?}", ids);
}
