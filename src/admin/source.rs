//! User sources for the admin directory
//!
//! A [`UserSource`] provides the full snapshot; incremental changes arrive on
//! a broadcast feed. With PostgreSQL the feed is filled from
//! `LISTEN user_changes` (see `migrations/0001_init.sql` for the trigger).

use async_trait::async_trait;
use sqlx::postgres::{PgListener, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::models::{UserChange, UserProfile};
use crate::ledger::StoreError;

/// Notification channel raised by the `users_tb` trigger
pub const USER_CHANGES_CHANNEL: &str = "user_changes";

#[async_trait]
pub trait UserSource: Send + Sync {
    /// Every user, any order
    async fn snapshot(&self) -> Result<Vec<UserProfile>, StoreError>;
}

pub struct PgUserSource {
    pool: PgPool,
}

impl PgUserSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_profile(row: &PgRow) -> Result<UserProfile, StoreError> {
        let role: String = row.try_get("role")?;
        Ok(UserProfile {
            user_id: row.try_get("user_id")?,
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            role: role.parse().map_err(StoreError::Rejected)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl UserSource for PgUserSource {
    async fn snapshot(&self) -> Result<Vec<UserProfile>, StoreError> {
        let rows = sqlx::query("SELECT user_id, full_name, email, role, created_at FROM users_tb")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_profile).collect()
    }
}

/// Forward `user_changes` notifications into the broadcast feed
///
/// Runs until the first listener cannot be created. Notifications sent while
/// the connection is down are lost; every reconnect publishes
/// [`UserChange::Resync`] so subscribers reload. Malformed payloads are
/// logged and skipped.
pub async fn listen_user_changes(
    pool: PgPool,
    feed: broadcast::Sender<UserChange>,
) -> Result<(), sqlx::Error> {
    let mut listener = subscribe(&pool).await?;
    info!(channel = USER_CHANGES_CHANNEL, "Listening for user changes");

    loop {
        match listener.try_recv().await {
            Ok(Some(notification)) => {
                match serde_json::from_str::<UserChange>(notification.payload()) {
                    Ok(change) => {
                        debug!(user_id = ?change.user_id(), "User change received");
                        // No receivers is fine: nobody is watching the directory yet
                        let _ = feed.send(change);
                    }
                    Err(e) => {
                        warn!(error = %e, payload = notification.payload(), "Malformed user change");
                    }
                }
            }
            // Connection was lost and has been re-established
            Ok(None) => {
                warn!("User change listener reconnected, requesting resync");
                let _ = feed.send(UserChange::Resync);
            }
            Err(e) => {
                error!(error = %e, "User change listener error, reconnecting");
                listener = reconnect(&pool).await;
                let _ = feed.send(UserChange::Resync);
            }
        }
    }
}

async fn subscribe(pool: &PgPool) -> Result<PgListener, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(USER_CHANGES_CHANNEL).await?;
    Ok(listener)
}

async fn reconnect(pool: &PgPool) -> PgListener {
    loop {
        match subscribe(pool).await {
            Ok(listener) => {
                info!(channel = USER_CHANGES_CHANNEL, "User change listener reconnected");
                return listener;
            }
            Err(e) => {
                error!(error = %e, "User change listener reconnect failed, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
