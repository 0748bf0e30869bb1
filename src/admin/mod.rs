//! Admin console: real-time user list

pub mod directory;
pub mod models;
pub mod source;

pub use directory::UserDirectory;
pub use models::{UserChange, UserProfile};
pub use source::{PgUserSource, UserSource, listen_user_changes};
