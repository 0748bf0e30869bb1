//! Admin console handlers

use std::sync::Arc;

use axum::{Extension, extract::State};

use super::super::state::AppState;
use super::super::types::{ApiResult, ok};
use crate::admin::UserProfile;
use crate::session::Session;

/// GET /api/v1/admin/users
///
/// Live user list, newest first. Admin role only.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<UserProfile>> {
    session.require_admin()?;
    ok(state.directory.list().await)
}
