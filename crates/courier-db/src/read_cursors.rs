use crate::conversations::{map_conversation_row, require_participant};
use crate::models::{ConversationSummaryRow, MessageRow, SettingsRow};
use crate::{Database, Result};

impl Database {
    /// Advance the caller's read cursor to the conversation's current last
    /// message. The monotonicity guard lives in the upsert's WHERE clause,
    /// so a stale marker can never move a cursor backward, and repeating the
    /// call is a no-op. A conversation with no messages has nothing to mark.
    pub fn mark_conversation_read(
        &self,
        conversation_id: i64,
        user_id: i64,
        now_ms: i64,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let conv = require_participant(conn, conversation_id, user_id)?;
            let Some(last_id) = conv.last_message_id else {
                return Ok(());
            };
            advance_cursor(conn, conversation_id, user_id, last_id, now_ms)
        })
    }

    /// Move a cursor to a specific message ordinal. Forward-only: the WHERE
    /// clause on the upsert rejects any position at or behind the stored
    /// one, so concurrent markers cannot regress each other.
    pub fn advance_read_cursor(
        &self,
        conversation_id: i64,
        user_id: i64,
        message_id: i64,
        now_ms: i64,
    ) -> Result<()> {
        self.with_conn(|conn| advance_cursor(conn, conversation_id, user_id, message_id, now_ms))
    }

    /// The stored cursor position, if any.
    pub fn read_cursor(&self, conversation_id: i64, user_id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let pos = conn
                .query_row(
                    "SELECT last_read_message_id FROM read_cursors
                     WHERE conversation_id = ?1 AND user_id = ?2",
                    rusqlite::params![conversation_id, user_id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    e => Err(e),
                })?;
            Ok(pos)
        })
    }

    /// Messages past the user's cursor, not counting their own messages or
    /// soft-deleted ones. No cursor row means everything is unread.
    pub fn unread_count(&self, conversation_id: i64, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages m
                 WHERE m.conversation_id = ?1
                   AND m.sender_id != ?2
                   AND m.deleted_at IS NULL
                   AND m.id > COALESCE(
                        (SELECT last_read_message_id FROM read_cursors
                         WHERE conversation_id = ?1 AND user_id = ?2), 0)",
                rusqlite::params![conversation_id, user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// One summary per conversation the user participates in, most recent
    /// activity first. Last message, unread count, and settings come back
    /// from a single query rather than per-conversation lookups.
    pub fn list_conversations_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<ConversationSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.participant_low, c.participant_high, c.created_at,
                        c.last_message_at, c.last_message_id,
                        m.id, m.conversation_id, m.sender_id,
                        CASE WHEN m.deleted_at IS NULL THEN m.body ELSE '' END,
                        m.created_at, m.edited_at, m.deleted_at,
                        (SELECT COUNT(*) FROM messages u
                         WHERE u.conversation_id = c.id
                           AND u.sender_id != ?1
                           AND u.deleted_at IS NULL
                           AND u.id > COALESCE(
                                (SELECT last_read_message_id FROM read_cursors r
                                 WHERE r.conversation_id = c.id AND r.user_id = ?1), 0)),
                        COALESCE(s.archived, 0), COALESCE(s.muted, 0)
                 FROM conversations c
                 LEFT JOIN messages m ON m.id = c.last_message_id
                 LEFT JOIN conversation_settings s
                        ON s.conversation_id = c.id AND s.user_id = ?1
                 WHERE ?1 IN (c.participant_low, c.participant_high)
                 ORDER BY c.last_message_at DESC, c.id DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    let conversation = map_conversation_row(row)?;
                    let last_message = map_optional_message(row)?;
                    Ok(ConversationSummaryRow {
                        conversation,
                        last_message,
                        unread_count: row.get(13)?,
                        settings: SettingsRow {
                            archived: row.get(14)?,
                            muted: row.get(15)?,
                        },
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn advance_cursor(
    conn: &rusqlite::Connection,
    conversation_id: i64,
    user_id: i64,
    message_id: i64,
    now_ms: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO read_cursors (conversation_id, user_id, last_read_message_id, read_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (conversation_id, user_id) DO UPDATE SET
            last_read_message_id = excluded.last_read_message_id,
            read_at = excluded.read_at
         WHERE excluded.last_read_message_id > read_cursors.last_read_message_id",
        rusqlite::params![conversation_id, user_id, message_id, now_ms],
    )?;
    Ok(())
}

fn map_optional_message(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<Option<MessageRow>, rusqlite::Error> {
    let id: Option<i64> = row.get(6)?;
    if id.is_none() {
        return Ok(None);
    }
    Ok(Some(MessageRow {
        id: row.get(6)?,
        conversation_id: row.get(7)?,
        sender_id: row.get(8)?,
        body: row.get(9)?,
        created_at: row.get(10)?,
        edited_at: row.get(11)?,
        deleted_at: row.get(12)?,
    }))
}
