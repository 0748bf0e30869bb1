use std::sync::Arc;

use crate::admin::UserDirectory;
use crate::backend::Backend;
use crate::card::CardService;
use crate::config::{AuthConfig, TransferConfig};
use crate::db::Database;
use crate::funding::FundingService;
use crate::session::SessionRegistry;
use crate::transfer::adapters::{AccountAdapter, CardAdapter};
use crate::transfer::TransferCoordinator;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    pub funding: Arc<FundingService>,
    pub cards: Arc<CardService>,
    pub sessions: Arc<SessionRegistry>,
    /// Admin user list, kept current by the change feed
    pub directory: Arc<UserDirectory>,
    /// HS256 key for session tokens
    pub jwt_secret: String,
    /// HS256 key for identity provider tokens
    pub identity_secret: String,
    /// Shared secret for `/internal/mock/*`
    pub internal_secret: String,
    /// PostgreSQL pool, pinged by the health check. None with the in-memory backend.
    pub db: Option<Arc<Database>>,
}

impl AppState {
    /// Wire every service on top of one backend
    pub fn build(
        backend: &Backend,
        db: Option<Arc<Database>>,
        auth: &AuthConfig,
        transfer: &TransferConfig,
    ) -> Self {
        let coordinator = Arc::new(TransferCoordinator::with_config(
            backend.intents.clone(),
            Arc::new(AccountAdapter::new(backend.accounts.clone())),
            Arc::new(CardAdapter::new(backend.cards.clone())),
            backend.recorder.clone(),
            transfer.coordinator(),
        ));

        Self {
            funding: Arc::new(FundingService::new(
                backend.accounts.clone(),
                backend.cards.clone(),
                coordinator,
            )),
            cards: Arc::new(CardService::new(
                backend.cards.clone(),
                backend.recorder.clone(),
            )),
            sessions: Arc::new(SessionRegistry::new(chrono::Duration::minutes(
                auth.session_ttl_minutes,
            ))),
            directory: Arc::new(UserDirectory::new(backend.users.clone())),
            jwt_secret: auth.jwt_secret.clone(),
            identity_secret: auth.identity_secret.clone(),
            internal_secret: auth.internal_secret.clone(),
            db,
        }
    }

    pub fn coordinator(&self) -> &Arc<TransferCoordinator> {
        self.funding.coordinator()
    }
}
