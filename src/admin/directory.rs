//! Admin User Directory
//!
//! In-memory view of all users kept current from a change feed. The admin
//! console reads it instead of querying `users_tb` on every refresh.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::models::{UserChange, UserProfile};
use super::source::UserSource;
use crate::ledger::StoreError;

pub struct UserDirectory {
    source: Arc<dyn UserSource>,
    users: RwLock<BTreeMap<i64, UserProfile>>,
}

impl UserDirectory {
    /// Empty directory; call [`reload`](Self::reload) to populate it
    pub fn new(source: Arc<dyn UserSource>) -> Self {
        Self {
            source,
            users: RwLock::new(BTreeMap::new()),
        }
    }

    /// Replace the contents with a fresh snapshot
    ///
    /// On error the previous contents are kept.
    pub async fn reload(&self) -> Result<usize, StoreError> {
        let snapshot = self.source.snapshot().await?;
        let users: BTreeMap<i64, UserProfile> =
            snapshot.into_iter().map(|u| (u.user_id, u)).collect();
        let count = users.len();
        *self.users.write().await = users;
        info!(count, "User directory loaded");
        Ok(count)
    }

    pub async fn apply(&self, change: UserChange) {
        let mut users = self.users.write().await;
        match change {
            UserChange::Insert { user } | UserChange::Update { user } => {
                debug!(user_id = user.user_id, "Directory upsert");
                users.insert(user.user_id, user);
            }
            UserChange::Delete { user_id } => {
                debug!(user_id, "Directory delete");
                users.remove(&user_id);
            }
            // Carries no row; `sync` answers it with a reload
            UserChange::Resync => {}
        }
    }

    /// All users, newest first
    pub async fn list(&self) -> Vec<UserProfile> {
        let mut users: Vec<UserProfile> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.user_id.cmp(&a.user_id))
        });
        users
    }

    pub async fn get(&self, user_id: i64) -> Option<UserProfile> {
        self.users.read().await.get(&user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Apply changes from `feed` until it closes
    ///
    /// If the receiver falls behind or the upstream listener reports a gap,
    /// events were lost and the directory reloads the full snapshot.
    pub async fn sync(&self, mut feed: broadcast::Receiver<UserChange>) {
        loop {
            match feed.recv().await {
                Ok(UserChange::Resync) => {
                    warn!("User feed requested resync, reloading directory");
                    self.resync().await;
                }
                Ok(change) => self.apply(change).await,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "User feed lagged, reloading directory");
                    self.resync().await;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("User feed closed, directory sync stopped");
                    return;
                }
            }
        }
    }

    async fn resync(&self) {
        if let Err(e) = self.reload().await {
            error!(error = %e, "Directory reload failed, keeping stale view");
        }
    }

    /// Run [`sync`](Self::sync) on a background task
    pub fn spawn_sync(self: Arc<Self>, feed: broadcast::Receiver<UserChange>) -> JoinHandle<()> {
        tokio::spawn(async move { self.sync(feed).await })
    }

    /// Subscribe to `feed`, load the snapshot, then follow the feed
    ///
    /// The subscription is taken before the snapshot so a change landing in
    /// between is replayed on top of it (upserts and deletes are idempotent).
    pub async fn start(
        self: Arc<Self>,
        feed: &broadcast::Sender<UserChange>,
    ) -> Result<(usize, JoinHandle<()>), StoreError> {
        let receiver = feed.subscribe();
        let loaded = self.reload().await?;
        Ok((loaded, self.spawn_sync(receiver)))
    }
}
