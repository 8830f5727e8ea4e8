use rusqlite::Connection;

use crate::models::SettingsRow;
use crate::{Database, Result};

/// Per-viewer conversation flags. Rows are created lazily; a missing row is
/// the documented default (not archived, not muted). These only affect the
/// viewer's own list — never the other participant or the message data.
impl Database {
    pub fn set_archived(&self, conversation_id: i64, user_id: i64, archived: bool) -> Result<SettingsRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversation_settings (conversation_id, user_id, archived)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (conversation_id, user_id) DO UPDATE SET
                    archived = excluded.archived",
                rusqlite::params![conversation_id, user_id, archived],
            )?;
            query_settings(conn, conversation_id, user_id)
        })
    }

    pub fn set_muted(&self, conversation_id: i64, user_id: i64, muted: bool) -> Result<SettingsRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversation_settings (conversation_id, user_id, muted)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (conversation_id, user_id) DO UPDATE SET
                    muted = excluded.muted",
                rusqlite::params![conversation_id, user_id, muted],
            )?;
            query_settings(conn, conversation_id, user_id)
        })
    }

    pub fn get_settings(&self, conversation_id: i64, user_id: i64) -> Result<SettingsRow> {
        self.with_conn(|conn| query_settings(conn, conversation_id, user_id))
    }
}

fn query_settings(conn: &Connection, conversation_id: i64, user_id: i64) -> Result<SettingsRow> {
    let row = conn
        .query_row(
            "SELECT archived, muted FROM conversation_settings
             WHERE conversation_id = ?1 AND user_id = ?2",
            rusqlite::params![conversation_id, user_id],
            |row| {
                Ok(SettingsRow {
                    archived: row.get(0)?,
                    muted: row.get(1)?,
                })
            },
        )
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(SettingsRow::default()),
            e => Err(e),
        })?;
    Ok(row)
}
