use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Message;

// -- Auth --

/// Body of both `/register` and `/login`. Missing fields decode as empty so
/// the handler can report which one is absent.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    pub expire_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: i64,
    pub username: String,
}

// -- Messages --

/// Body of message create and update.
#[derive(Debug, Default, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub recipients: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub content: String,
    pub sender: String,
    pub sent_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(msg: Message) -> Self {
        Self {
            id: msg.id,
            content: msg.content,
            sender: msg.sender,
            sent_at: msg.sent_at,
            updated_at: msg.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageResponse>,
}

// -- Misc --

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    #[serde(rename = "buildTime")]
    pub build_time: String,
    pub commit: String,
    pub release: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}
