//! HTTP gateway
//!
//! JSON API over the banking services. Every response uses the
//! `{code, msg, data}` envelope; authenticated routes carry a bearer token
//! naming a live session.

pub mod auth;
pub mod handlers;
pub mod state;
pub mod types;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
pub use state::AppState;

/// Build the complete router
pub fn router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/logout", post(handlers::logout))
        .layer(from_fn_with_state(state.clone(), auth::jwt_auth_middleware))
        // Unauthenticated: this is where a session comes from
        .route("/session", post(handlers::open_session));

    let account_routes = Router::new()
        .route(
            "/",
            get(handlers::list_accounts).post(handlers::open_account),
        )
        .route("/{id}/deposit", post(handlers::deposit))
        .layer(from_fn_with_state(state.clone(), auth::jwt_auth_middleware));

    let card_routes = Router::new()
        .route("/", get(handlers::list_cards).post(handlers::issue_card))
        .route("/{id}/freeze", post(handlers::freeze_card))
        .route("/{id}/unfreeze", post(handlers::unfreeze_card))
        .route("/{id}/fund", post(handlers::fund_card))
        .route("/{id}/transactions", get(handlers::card_transactions))
        .layer(from_fn_with_state(state.clone(), auth::jwt_auth_middleware));

    let transfer_routes = Router::new()
        .route(
            "/",
            get(handlers::list_transfers).post(handlers::create_wire),
        )
        .route("/{id}", get(handlers::get_transfer))
        .layer(from_fn_with_state(state.clone(), auth::jwt_auth_middleware));

    let admin_routes = Router::new()
        .route("/users", get(handlers::list_users))
        .layer(from_fn_with_state(state.clone(), auth::jwt_auth_middleware));

    let app = Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/accounts", account_routes)
        .nest("/api/v1/cards", card_routes)
        .nest("/api/v1/transfers", transfer_routes)
        .nest("/api/v1/admin", admin_routes);

    // [SECURITY] Mock API routes - only compiled when 'mock-api' feature is enabled.
    // Production builds MUST be compiled with `--no-default-features` to exclude this.
    #[cfg(feature = "mock-api")]
    let app = app.nest(
        "/internal/mock",
        Router::new().route("/session", post(handlers::mock_session)),
    );

    app.with_state(state)
}

/// Bind and serve until the server fails
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        tracing::error!(
            addr = %addr,
            error = %e,
            "Failed to bind. Port {} may already be in use, check with: lsof -i :{}",
            config.port,
            config.port
        );
        anyhow::anyhow!("failed to bind {}: {}", addr, e)
    })?;

    tracing::info!(addr = %addr, "🚀 Gateway listening");
    #[cfg(feature = "mock-api")]
    tracing::warn!("mock-api enabled: /internal/mock/session mints sessions");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::account::AccountType;
    use crate::admin::UserProfile;
    use crate::backend::Backend;
    use crate::config::{AuthConfig, TransferConfig};
    use crate::memory::InMemoryBank;
    use crate::session::Role;

    fn setup() -> (Arc<InMemoryBank>, Arc<AppState>) {
        let bank = Arc::new(InMemoryBank::new());
        let transfer = TransferConfig {
            max_stalls: 1,
            retry_delay_ms: 0,
            ..TransferConfig::default()
        };
        let state = AppState::build(
            &Backend::in_memory(bank.clone()),
            None,
            &AuthConfig::default(),
            &transfer,
        );
        (bank, Arc::new(state))
    }

    fn login(state: &AppState, user_id: i64, role: Role) -> String {
        let session = state.sessions.open(user_id, role);
        auth::issue_token(&session, &state.jwt_secret).unwrap()
    }

    fn identity_token(state: &AppState, sub: &str) -> String {
        let claims = auth::IdentityClaims {
            sub: sub.to_string(),
            exp: chrono::Utc::now().timestamp() as usize + 300,
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(state.identity_secret.as_bytes()),
        )
        .unwrap()
    }

    async fn register(bank: &InMemoryBank, state: &AppState, user_id: i64, role: Role) {
        bank.upsert_user(UserProfile {
            user_id,
            full_name: format!("User {}", user_id),
            email: format!("{}@example.com", user_id),
            role,
            created_at: chrono::Utc::now(),
        });
        state.directory.reload().await.unwrap();
    }

    async fn call(
        state: &Arc<AppState>,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_without_database() {
        let (_bank, state) = setup();
        let (status, body) = call(&state, "GET", "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 0);
        assert!(body["data"]["timestamp_ms"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_missing_and_bad_tokens() {
        let (_bank, state) = setup();
        let (status, body) = call(&state, "GET", "/api/v1/accounts", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], types::error_codes::MISSING_AUTH);

        let (status, body) = call(&state, "GET", "/api/v1/accounts", Some("junk"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], types::error_codes::AUTH_FAILED);
    }

    #[tokio::test]
    async fn test_fund_card_over_http() {
        let (bank, state) = setup();
        let account = bank.seed_account(1001, AccountType::Checking, Decimal::new(10_000, 2));
        let card = bank.seed_card(1001, "Everyday", Decimal::ZERO);
        let token = login(&state, 1001, Role::Customer);

        let (status, body) = call(
            &state,
            "POST",
            &format!("/api/v1/cards/{}/fund", card.card_id),
            Some(&token),
            Some(json!({"account_id": account.account_id, "amount": "30.00"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["state"], "COMMITTED");
        assert_eq!(body["data"]["audit_recorded"], true);

        let (_, body) = call(
            &state,
            "GET",
            &format!("/api/v1/cards/{}/transactions", card.card_id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(bank.account(account.account_id).unwrap().balance(), Decimal::new(7_000, 2));
    }

    #[tokio::test]
    async fn test_insufficient_balance_envelope() {
        let (bank, state) = setup();
        let account = bank.seed_account(1001, AccountType::Checking, Decimal::new(2_000, 2));
        let card = bank.seed_card(1001, "Everyday", Decimal::ZERO);
        let token = login(&state, 1001, Role::Customer);

        let (status, body) = call(
            &state,
            "POST",
            &format!("/api/v1/cards/{}/fund", card.card_id),
            Some(&token),
            Some(json!({"account_id": account.account_id, "amount": 30})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], types::error_codes::INSUFFICIENT_BALANCE);
        assert_eq!(body["msg"], "Insufficient balance");
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let (_bank, state) = setup();
        let token = login(&state, 1001, Role::Customer);

        let (status, _) = call(&state, "GET", "/api/v1/cards", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&state, "POST", "/api/v1/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["logged_out"], true);

        let (status, _) = call(&state, "GET", "/api/v1/cards", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_users_requires_admin() {
        let (_bank, state) = setup();
        let customer = login(&state, 1001, Role::Customer);
        let admin = login(&state, 1, Role::Admin);

        let (status, _) = call(&state, "GET", "/api/v1/admin/users", Some(&customer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(&state, "GET", "/api/v1/admin/users", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].is_array());
    }

    #[tokio::test]
    async fn test_wire_and_history() {
        let (bank, state) = setup();
        let from = bank.seed_account(1001, AccountType::Checking, Decimal::new(10_000, 2));
        let to = bank.seed_account(2002, AccountType::Savings, Decimal::ZERO);
        let token = login(&state, 1001, Role::Customer);

        let (status, body) = call(
            &state,
            "POST",
            "/api/v1/transfers",
            Some(&token),
            Some(json!({
                "from_account_id": from.account_id,
                "to_account_number": to.account_number,
                "amount": "25.50"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let transfer_id = body["data"]["transfer_id"].as_str().unwrap().to_string();

        let (_, body) = call(&state, "GET", "/api/v1/transfers", Some(&token), None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) = call(
            &state,
            "GET",
            &format!("/api/v1/transfers/{}", transfer_id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "COMMITTED");

        // Someone else's transfer
        let other = login(&state, 2002, Role::Customer);
        let (status, _) = call(
            &state,
            "GET",
            &format!("/api/v1/transfers/{}", transfer_id),
            Some(&other),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_session_exchange_opens_usable_session() {
        let (bank, state) = setup();
        register(&bank, &state, 1001, Role::Customer).await;
        bank.seed_account(1001, AccountType::Checking, Decimal::new(5_000, 2));

        let (status, body) = call(
            &state,
            "POST",
            "/api/v1/auth/session",
            None,
            Some(json!({"id_token": identity_token(&state, "1001")})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["user_id"], 1001);
        assert_eq!(body["data"]["role"], "customer");
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let (status, body) = call(&state, "GET", "/api/v1/accounts", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = call(&state, "GET", "/api/v1/admin/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_session_role_comes_from_user_record() {
        let (bank, state) = setup();
        register(&bank, &state, 1, Role::Admin).await;

        let (status, body) = call(
            &state,
            "POST",
            "/api/v1/auth/session",
            None,
            Some(json!({"id_token": identity_token(&state, "1")})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["role"], "admin");
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let (status, body) = call(&state, "GET", "/api/v1/admin/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_session_exchange_rejects_unknown_user_and_bad_token() {
        let (bank, state) = setup();
        register(&bank, &state, 1001, Role::Customer).await;

        let (status, body) = call(
            &state,
            "POST",
            "/api/v1/auth/session",
            None,
            Some(json!({"id_token": identity_token(&state, "2002")})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], types::error_codes::AUTH_FAILED);

        // Signed with the session key instead of the identity provider key
        let forged = login(&state, 1001, Role::Admin);
        let (status, _) = call(
            &state,
            "POST",
            "/api/v1/auth/session",
            None,
            Some(json!({"id_token": forged})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(state.sessions.len(), 1);
    }

    #[cfg(feature = "mock-api")]
    #[tokio::test]
    async fn test_mock_session_checks_internal_secret() {
        let (_bank, state) = setup();

        let (status, _) = call(
            &state,
            "POST",
            "/internal/mock/session",
            None,
            Some(json!({"user_id": 1001})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method("POST")
            .uri("/internal/mock/session")
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Internal-Secret", state.internal_secret.clone())
            .body(Body::from(json!({"user_id": 1001, "role": "admin"}).to_string()))
            .unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        let token = body["data"]["token"].as_str().unwrap();

        let (status, _) = call(&state, "GET", "/api/v1/admin/users", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
