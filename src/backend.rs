//! Storage backend selection
//!
//! Bundles one implementation of every storage trait. PostgreSQL in
//! production; the in-memory bank for development without a database.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::account::{AccountLedger, PgAccountLedger};
use crate::admin::{PgUserSource, UserChange, UserSource};
use crate::card::{CardStore, PgCardStore, PgTransactionRecorder, TransactionRecorder};
use crate::db::Database;
use crate::memory::InMemoryBank;
use crate::transfer::{IntentStore, PgIntentStore};

/// Capacity of the admin user change feed
pub const USER_FEED_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct Backend {
    pub accounts: Arc<dyn AccountLedger>,
    pub cards: Arc<dyn CardStore>,
    pub recorder: Arc<dyn TransactionRecorder>,
    pub intents: Arc<dyn IntentStore>,
    pub users: Arc<dyn UserSource>,
    /// Change events for the admin directory
    pub user_feed: broadcast::Sender<UserChange>,
}

impl Backend {
    /// PostgreSQL-backed stores sharing one pool
    ///
    /// The user feed is empty until `admin::listen_user_changes` is started
    /// with the returned sender.
    pub fn postgres(db: &Database) -> Self {
        let pool = db.pool().clone();
        let (user_feed, _) = broadcast::channel(USER_FEED_CAPACITY);
        Self {
            accounts: Arc::new(PgAccountLedger::new(pool.clone())),
            cards: Arc::new(PgCardStore::new(pool.clone())),
            recorder: Arc::new(PgTransactionRecorder::new(pool.clone())),
            intents: Arc::new(PgIntentStore::new(pool.clone())),
            users: Arc::new(PgUserSource::new(pool)),
            user_feed,
        }
    }

    pub fn in_memory(bank: Arc<InMemoryBank>) -> Self {
        let user_feed = bank
            .user_feed()
            .unwrap_or_else(|| broadcast::channel(USER_FEED_CAPACITY).0);
        Self {
            accounts: bank.clone(),
            cards: bank.clone(),
            recorder: bank.clone(),
            intents: bank.clone(),
            users: bank,
            user_feed,
        }
    }
}
