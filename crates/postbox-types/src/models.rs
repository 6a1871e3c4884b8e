use chrono::{DateTime, Utc};

/// A registered user as seen by everything outside the auth path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// Stored login credential. The hash is a PHC string, never the raw password.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

/// The single live token of a user. `updated_at` is the login time and
/// drives expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub user_id: i64,
    pub updated_at: DateTime<Utc>,
}

impl Token {
    /// A token is live up to and including `updated_at + ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now > self.updated_at + ttl
    }

    pub fn expires_at(&self, ttl: chrono::Duration) -> DateTime<Utc> {
        self.updated_at + ttl
    }
}

/// A message with its sender's display name joined in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub content: String,
    pub sender_id: i64,
    pub sender: String,
    pub sent_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a message that do not exist until the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub sender_id: i64,
    pub sent_at: DateTime<Utc>,
}

/// Usernames are compared trimmed and lowercased everywhere.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}
