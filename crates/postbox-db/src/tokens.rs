use chrono::{DateTime, Utc};
use postbox_types::models::Token;
use rusqlite::params;

use crate::{Database, Result};

impl Database {
    /// Stores `token` as the only token of `user_id`, replacing any earlier
    /// token and its timestamp.
    pub fn upsert_token(&self, user_id: i64, token: &str, updated_at: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO tokens (user_id, token, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET token = excluded.token, updated_at = excluded.updated_at",
                params![user_id, token, updated_at],
            )?;
            Ok(())
        })
    }

    pub fn get_token(&self, token: &str) -> Result<Token> {
        self.with_conn(|conn| {
            let token = conn.query_row(
                "SELECT user_id, updated_at FROM tokens WHERE token = ?1",
                [token],
                |row| {
                    Ok(Token {
                        user_id: row.get(0)?,
                        updated_at: row.get(1)?,
                    })
                },
            )?;
            Ok(token)
        })
    }
}
