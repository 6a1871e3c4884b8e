use postbox_types::models::{Credential, User};
use rusqlite::params;

use crate::{Database, Result};

impl Database {
    /// Inserts a credential and returns the new user id. A taken username
    /// fails with [`StoreError::Duplicate`](crate::StoreError::Duplicate).
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
                params![username, password_hash],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Credential> {
        self.with_conn(|conn| {
            let cred = conn.query_row(
                "SELECT id, username, password_hash FROM users WHERE username = ?1",
                [username],
                |row| {
                    Ok(Credential {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                    })
                },
            )?;
            Ok(cred)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<User> {
        self.with_conn(|conn| {
            let user = conn.query_row(
                "SELECT id, username FROM users WHERE id = ?1",
                [id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                    })
                },
            )?;
            Ok(user)
        })
    }
}
