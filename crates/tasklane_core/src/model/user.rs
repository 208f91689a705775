//! Identity shapes owned by the backend auth subsystem.
//!
//! The core references these values but never mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Stable identifier of an authenticated user.
pub type UserId = Uuid;

/// Metadata key carrying the display username chosen at sign-up.
pub const USERNAME_METADATA_KEY: &str = "username";

/// Authenticated user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Free-form metadata supplied at sign-up.
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Returns the sign-up username when present in metadata.
    pub fn username(&self) -> Option<&str> {
        self.user_metadata
            .get(USERNAME_METADATA_KEY)
            .and_then(Value::as_str)
    }
}

/// Backend-held session. The access token is opaque to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: User,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result payload of sign-up and sign-in calls.
///
/// `session` may be absent after sign-up when the backend requires a
/// confirmation step before issuing one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: Option<User>,
    pub session: Option<AuthSession>,
}

/// Public profile row. Read model only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
