//! Session tokens
//!
//! A bearer token is an HS256 JWT naming a live session. The middleware
//! resolves it against the `SessionRegistry`, so a logged-out session is
//! rejected even while its token is unexpired.
//!
//! Sessions are opened by exchanging an identity provider token (HS256,
//! shared `identity_secret`) whose `sub` is the user id.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::state::AppState;
use super::types::ApiError;
use crate::session::Session;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user_id as string
    pub sid: String, // session id
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

pub fn issue_token(session: &Session, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: session.user_id.to_string(),
        sid: session.session_id.to_string(),
        role: session.role.to_string(),
        exp: session.expires_at.timestamp() as usize,
        iat: session.issued_at.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<Claims>(token, &decoding_key, &validation)?;
    Ok(token_data.claims)
}

/// Claims of an identity provider token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdentityClaims {
    pub sub: String,
    pub exp: usize,
}

pub fn verify_identity_token(
    token: &str,
    secret: &str,
) -> Result<IdentityClaims, jsonwebtoken::errors::Error> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    Ok(decode::<IdentityClaims>(token, &decoding_key, &validation)?.claims)
}

/// Resolve the bearer token to a live `Session` and inject it into the request
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::missing_auth("Missing Authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Invalid token format"))?;

    let claims = verify_token(token, &state.jwt_secret)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    let session_id: ulid::Ulid = claims
        .sid
        .parse()
        .map_err(|_| ApiError::unauthorized("Invalid session in token"))?;

    let session = state.sessions.resolve(&session_id)?;
    if claims.sub != session.user_id.to_string() {
        tracing::warn!(session_id = %session_id, sub = %claims.sub, "Token subject does not match session");
        return Err(ApiError::unauthorized("Invalid or expired token"));
    }

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}
