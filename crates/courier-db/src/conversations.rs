use rusqlite::Connection;

use crate::models::ConversationRow;
use crate::{CoreError, Database, Result};

impl Database {
    /// Return the conversation for an unordered user pair, creating it if
    /// absent. Safe under arbitrary concurrent callers: the unique index on
    /// (participant_low, participant_high) arbitrates racing creators, and
    /// the loser's conflict-ignored insert falls through to re-reading the
    /// winner's row. Never pre-checks-then-inserts without the constraint.
    pub fn get_or_create_conversation(
        &self,
        user_a: i64,
        user_b: i64,
        now_ms: i64,
    ) -> Result<ConversationRow> {
        if user_a == user_b {
            return Err(CoreError::Validation(
                "a conversation needs two distinct participants",
            ));
        }
        let (low, high) = if user_a < user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        };

        self.with_conn(|conn| {
            // One internal retry: select, insert-or-ignore, select again.
            for _ in 0..2 {
                if let Some(row) = query_conversation_by_pair(conn, low, high)? {
                    return Ok(row);
                }
                conn.execute(
                    "INSERT INTO conversations
                        (participant_low, participant_high, created_at, last_message_at)
                     VALUES (?1, ?2, ?3, ?3)
                     ON CONFLICT (participant_low, participant_high) DO NOTHING",
                    rusqlite::params![low, high, now_ms],
                )?;
            }
            query_conversation_by_pair(conn, low, high)?
                .ok_or(CoreError::Conflict("conversation creation race unresolved"))
        })
    }

    pub fn get_conversation(&self, id: i64) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| query_conversation(conn, id))
    }

    /// Ownership check used by the request layer: the conversation must
    /// exist and `user_id` must be one of its two participants.
    pub fn conversation_for_participant(
        &self,
        id: i64,
        user_id: i64,
    ) -> Result<ConversationRow> {
        self.with_conn(|conn| require_participant(conn, id, user_id))
    }
}

pub(crate) fn require_participant(
    conn: &Connection,
    conversation_id: i64,
    user_id: i64,
) -> Result<ConversationRow> {
    let conv =
        query_conversation(conn, conversation_id)?.ok_or(CoreError::NotFound("conversation"))?;
    if !conv.is_participant(user_id) {
        return Err(CoreError::Forbidden("not a participant of this conversation"));
    }
    Ok(conv)
}

pub(crate) fn query_conversation(conn: &Connection, id: i64) -> Result<Option<ConversationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, participant_low, participant_high, created_at, last_message_at, last_message_id
         FROM conversations WHERE id = ?1",
    )?;
    let row = stmt
        .query_row([id], map_conversation_row)
        .optional()?;
    Ok(row)
}

fn query_conversation_by_pair(
    conn: &Connection,
    low: i64,
    high: i64,
) -> Result<Option<ConversationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, participant_low, participant_high, created_at, last_message_at, last_message_id
         FROM conversations WHERE participant_low = ?1 AND participant_high = ?2",
    )?;
    let row = stmt
        .query_row([low, high], map_conversation_row)
        .optional()?;
    Ok(row)
}

pub(crate) fn map_conversation_row(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<ConversationRow, rusqlite::Error> {
    Ok(ConversationRow {
        id: row.get(0)?,
        participant_low: row.get(1)?,
        participant_high: row.get(2)?,
        created_at: row.get(3)?,
        last_message_at: row.get(4)?,
        last_message_id: row.get(5)?,
    })
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
