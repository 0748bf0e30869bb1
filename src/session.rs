//! Session context
//!
//! Explicit per-user session passed to every service call, replacing
//! client-side global identity caching. Sessions have a defined lifecycle:
//! `open` → `resolve`* → `logout` (or expiry).

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role carried by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" | "user" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found or logged out")]
    Unknown,

    #[error("Session expired")]
    Expired,

    #[error("Admin role required")]
    AdminRequired,
}

/// Authenticated user context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub session_id: ulid::Ulid,
    pub user_id: i64,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Guard for admin-only operations
    pub fn require_admin(&self) -> Result<(), SessionError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(SessionError::AdminRequired)
        }
    }
}

/// Registry of live sessions
///
/// A token is only honored while its session is present here, so `logout`
/// invalidates tokens that have not yet expired.
pub struct SessionRegistry {
    sessions: DashMap<ulid::Ulid, Session>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a session for an authenticated user
    pub fn open(&self, user_id: i64, role: Role) -> Session {
        let now = Utc::now();
        let session = Session {
            session_id: ulid::Ulid::new(),
            user_id,
            role,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.insert(session.session_id, session.clone());
        tracing::info!(user_id, role = %role, session_id = %session.session_id, "Session opened");
        session
    }

    /// Return the live session, dropping it if it has expired
    pub fn resolve(&self, session_id: &ulid::Ulid) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .get(session_id)
            .map(|s| s.clone())
            .ok_or(SessionError::Unknown)?;

        if session.is_expired_at(Utc::now()) {
            self.sessions.remove(session_id);
            return Err(SessionError::Expired);
        }
        Ok(session)
    }

    /// Invalidate a session. Returns false if it was not live.
    pub fn logout(&self, session_id: &ulid::Ulid) -> bool {
        let removed = self.sessions.remove(session_id);
        if let Some((_, session)) = &removed {
            tracing::info!(user_id = session.user_id, session_id = %session_id, "Session closed");
        }
        removed.is_some()
    }

    /// Remove every expired session; returns how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired_at(now));
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
