use std::collections::HashMap;

use rusqlite::Connection;

use crate::conversations::{require_participant, OptionalExt};
use crate::models::{AttachmentRow, MessageRow, NewAttachment, StoredMessage};
use crate::{CoreError, Database, Result};

impl Database {
    /// Append a message to a conversation. The message row, its attachment
    /// rows, and the parent conversation's last-message pointer are written
    /// in one transaction; a partially created triple is never observable.
    pub fn send_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        body: &str,
        attachments: &[NewAttachment],
        now_ms: i64,
    ) -> Result<StoredMessage> {
        self.with_conn(|conn| {
            require_participant(conn, conversation_id, sender_id)?;
            if body.trim().is_empty() && attachments.is_empty() {
                return Err(CoreError::Validation("message body is empty"));
            }

            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO messages (conversation_id, sender_id, body, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![conversation_id, sender_id, body, now_ms],
            )?;
            let message_id = tx.last_insert_rowid();

            let mut rows = Vec::with_capacity(attachments.len());
            for a in attachments {
                tx.execute(
                    "INSERT INTO message_attachments (message_id, storage_ref, mime_type, size_bytes)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![message_id, a.storage_ref, a.mime_type, a.size_bytes],
                )?;
                rows.push(AttachmentRow {
                    id: tx.last_insert_rowid(),
                    message_id,
                    storage_ref: a.storage_ref.clone(),
                    mime_type: a.mime_type.clone(),
                    size_bytes: a.size_bytes,
                });
            }

            tx.execute(
                "UPDATE conversations SET last_message_at = ?2, last_message_id = ?3 WHERE id = ?1",
                rusqlite::params![conversation_id, now_ms, message_id],
            )?;
            tx.commit()?;

            Ok(StoredMessage {
                message: MessageRow {
                    id: message_id,
                    conversation_id,
                    sender_id,
                    body: body.to_string(),
                    created_at: now_ms,
                    edited_at: None,
                    deleted_at: None,
                },
                attachments: rows,
            })
        })
    }

    /// Soft-delete a message. Only the sender may delete; the conversation's
    /// last-message pointer is left alone even when the latest message is
    /// deleted, so ordering never moves backward. Deleting an already
    /// deleted message is a no-op.
    pub fn soft_delete_message(
        &self,
        message_id: i64,
        requester_id: i64,
        now_ms: i64,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            let mut row =
                query_message(conn, message_id)?.ok_or(CoreError::NotFound("message"))?;
            if row.sender_id != requester_id {
                return Err(CoreError::Forbidden("only the sender can delete a message"));
            }
            if row.deleted_at.is_none() {
                conn.execute(
                    "UPDATE messages SET deleted_at = ?2 WHERE id = ?1",
                    rusqlite::params![message_id, now_ms],
                )?;
                row.deleted_at = Some(now_ms);
            }
            row.body.clear();
            Ok(row)
        })
    }

    /// Newest-first page of a conversation's messages; keyset pagination on
    /// message id via `before`. Soft-deleted rows come back as tombstones:
    /// present for stable cursors, body blanked at read time.
    pub fn list_messages(
        &self,
        conversation_id: i64,
        before: Option<i64>,
        limit: u32,
    ) -> Result<Vec<StoredMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id,
                        CASE WHEN deleted_at IS NULL THEN body ELSE '' END,
                        created_at, edited_at, deleted_at
                 FROM messages
                 WHERE conversation_id = ?1
                   AND (?2 IS NULL OR id < ?2)
                 ORDER BY id DESC
                 LIMIT ?3",
            )?;
            let messages = stmt
                .query_map(
                    rusqlite::params![conversation_id, before, limit],
                    map_message_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
            let mut by_message = attachments_for_messages(conn, &ids)?;

            Ok(messages
                .into_iter()
                .map(|message| {
                    let attachments = by_message.remove(&message.id).unwrap_or_default();
                    StoredMessage {
                        message,
                        attachments,
                    }
                })
                .collect())
        })
    }
}

pub(crate) fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, sender_id, body, created_at, edited_at, deleted_at
         FROM messages WHERE id = ?1",
    )?;
    let row = stmt.query_row([id], map_message_row).optional()?;
    Ok(row)
}

pub(crate) fn map_message_row(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
        edited_at: row.get(5)?,
        deleted_at: row.get(6)?,
    })
}

/// Batch-fetch attachments for a page of message ids in a single query.
fn attachments_for_messages(
    conn: &Connection,
    message_ids: &[i64],
) -> Result<HashMap<i64, Vec<AttachmentRow>>> {
    if message_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders: Vec<String> = (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT id, message_id, storage_ref, mime_type, size_bytes
         FROM message_attachments WHERE message_id IN ({})
         ORDER BY id",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
        .iter()
        .map(|id| id as &dyn rusqlite::types::ToSql)
        .collect();

    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok(AttachmentRow {
                id: row.get(0)?,
                message_id: row.get(1)?,
                storage_ref: row.get(2)?,
                mime_type: row.get(3)?,
                size_bytes: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_message: HashMap<i64, Vec<AttachmentRow>> = HashMap::new();
    for row in rows {
        by_message.entry(row.message_id).or_default().push(row);
    }
    Ok(by_message)
}
