//! Admin directory models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::Role;

/// User row shown in the admin console
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Change event on `users_tb`
///
/// Wire format of the `user_changes` notification payload:
/// `{"op":"insert","user":{...}}`, `{"op":"delete","user_id":7}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum UserChange {
    Insert { user: UserProfile },
    Update { user: UserProfile },
    Delete { user_id: i64 },
    /// Changes may have been missed upstream; reload the full snapshot
    Resync,
}

impl UserChange {
    /// Affected user; `None` for [`UserChange::Resync`]
    pub fn user_id(&self) -> Option<i64> {
        match self {
            UserChange::Insert { user } | UserChange::Update { user } => Some(user.user_id),
            UserChange::Delete { user_id } => Some(*user_id),
            UserChange::Resync => None,
        }
    }
}
