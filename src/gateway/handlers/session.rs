//! Session lifecycle handlers

use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};

use super::super::auth::{issue_token, verify_identity_token};
use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, ok};
use crate::session::{Role, Session};

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    /// Token issued by the identity provider
    pub id_token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub session_id: String,
    pub user_id: i64,
    pub role: Role,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl SessionResponse {
    fn issue(session: Session, secret: &str) -> Result<Self, ApiError> {
        let token = issue_token(&session, secret)
            .map_err(|e| ApiError::internal(format!("Failed to issue token: {}", e)))?;
        Ok(Self {
            token,
            session_id: session.session_id.to_string(),
            user_id: session.user_id,
            role: session.role,
            expires_at: session.expires_at,
        })
    }
}

/// POST /api/v1/auth/session
///
/// Exchanges an identity provider token for a session. The role is taken
/// from the user's `users_tb` row; unknown users are rejected.
pub async fn open_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionRequest>,
) -> ApiResult<SessionResponse> {
    let claims = verify_identity_token(&req.id_token, &state.identity_secret)
        .map_err(|_| ApiError::unauthorized("Invalid or expired identity token"))?;
    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| ApiError::unauthorized("Invalid subject in identity token"))?;

    let Some(user) = state.directory.get(user_id).await else {
        tracing::warn!(user_id, "Session refused: user not registered");
        return ApiError::unauthorized("Unknown user").into_err();
    };

    let session = state.sessions.open(user.user_id, user.role);
    tracing::info!(user_id, role = %session.role, session_id = %session.session_id, "Session opened");
    ok(SessionResponse::issue(session, &state.jwt_secret)?)
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// POST /api/v1/auth/logout
///
/// Invalidates the caller's session; its token is rejected from now on.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> ApiResult<LogoutResponse> {
    let logged_out = state.sessions.logout(&session.session_id);
    ok(LogoutResponse { logged_out })
}

#[cfg(feature = "mock-api")]
pub use mock::mock_session;

#[cfg(feature = "mock-api")]
mod mock {
    use super::*;
    use axum::http::HeaderMap;

    #[derive(Debug, Deserialize)]
    pub struct MockSessionRequest {
        pub user_id: i64,
        #[serde(default = "default_role")]
        pub role: Role,
    }

    fn default_role() -> Role {
        Role::Customer
    }

    /// POST /internal/mock/session
    ///
    /// Stands in for the external identity provider in dev/test builds.
    pub async fn mock_session(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Json(req): Json<MockSessionRequest>,
    ) -> ApiResult<SessionResponse> {
        let secret = headers
            .get("X-Internal-Secret")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::missing_auth("Missing X-Internal-Secret header"))?;
        if secret != state.internal_secret {
            tracing::warn!(user_id = req.user_id, "Mock session rejected: bad internal secret");
            return ApiError::unauthorized("Invalid internal secret").into_err();
        }
        if req.user_id <= 0 {
            return ApiError::bad_request("user_id must be positive").into_err();
        }

        let session = state.sessions.open(req.user_id, req.role);
        ok(SessionResponse::issue(session, &state.jwt_secret)?)
    }
}
