use chrono::{DateTime, Utc};
use postbox_types::models::{Message, NewMessage};
use rusqlite::{Connection, Row, Transaction, params};

use crate::{Database, Result, StoreError};

// Sender name is joined in so list results need no second lookup.
const SELECT_MESSAGE: &str = "
    SELECT m.id, m.content, m.sender_id, u.username, m.created_at, m.updated_at
    FROM messages m
    INNER JOIN users u ON u.id = m.sender_id";

impl Database {
    /// Writes the message row and all recipient rows in one transaction and
    /// returns the new message id. Nothing is kept if any recipient fails.
    pub fn create_message(&self, msg: &NewMessage, recipients: &[i64]) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO messages (content, sender_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![msg.content, msg.sender_id, msg.sent_at],
            )?;
            let message_id = tx.last_insert_rowid();

            insert_recipients(&tx, message_id, recipients)?;

            tx.commit()?;
            Ok(message_id)
        })
    }

    /// Messages addressed to `recipient_id`, in whatever order SQLite yields.
    pub fn get_messages_for_recipient(&self, recipient_id: i64) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{SELECT_MESSAGE}
                 INNER JOIN message_recipients r ON r.message_id = m.id
                 WHERE r.recipient_id = ?1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([recipient_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Message> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Replaces content, `updated_at` and the whole recipient set.
    pub fn update_message(
        &self,
        id: i64,
        content: &str,
        updated_at: DateTime<Utc>,
        recipients: &[i64],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let affected = tx.execute(
                "UPDATE messages SET content = ?1, updated_at = ?2 WHERE id = ?3",
                params![content, updated_at, id],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }

            tx.execute("DELETE FROM message_recipients WHERE message_id = ?1", [id])?;
            insert_recipients(&tx, id, recipients)?;

            tx.commit()?;
            Ok(())
        })
    }

    /// Recipient rows go with the message through the cascade.
    pub fn delete_message(&self, id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }
}

fn insert_recipients(tx: &Transaction<'_>, message_id: i64, recipients: &[i64]) -> Result<()> {
    let mut stmt =
        tx.prepare("INSERT INTO message_recipients (message_id, recipient_id) VALUES (?1, ?2)")?;
    for recipient_id in recipients {
        stmt.execute(params![message_id, recipient_id])?;
    }
    Ok(())
}

fn query_message(conn: &Connection, id: i64) -> Result<Message> {
    let sql = format!("{SELECT_MESSAGE} WHERE m.id = ?1");
    let msg = conn.query_row(&sql, [id], message_from_row)?;
    Ok(msg)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        content: row.get(1)?,
        sender_id: row.get(2)?,
        sender: row.get(3)?,
        sent_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
