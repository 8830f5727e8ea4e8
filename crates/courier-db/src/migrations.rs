use rusqlite::Connection;
use tracing::info;

use crate::Result;

/// All timestamps are unix milliseconds. Message ids are AUTOINCREMENT so
/// ids are strictly increasing and never reused; id order is message order.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            participant_low     INTEGER NOT NULL,
            participant_high    INTEGER NOT NULL,
            created_at          INTEGER NOT NULL,
            last_message_at     INTEGER NOT NULL,
            last_message_id     INTEGER,
            CHECK (participant_low < participant_high),
            UNIQUE (participant_low, participant_high)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL REFERENCES conversations(id),
            sender_id       INTEGER NOT NULL,
            body            TEXT NOT NULL,
            created_at      INTEGER NOT NULL,
            edited_at       INTEGER,
            deleted_at      INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, id);

        CREATE TABLE IF NOT EXISTS message_attachments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id  INTEGER NOT NULL REFERENCES messages(id),
            storage_ref TEXT NOT NULL,
            mime_type   TEXT NOT NULL,
            size_bytes  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_attachments_message
            ON message_attachments(message_id);

        CREATE TABLE IF NOT EXISTS read_cursors (
            conversation_id         INTEGER NOT NULL REFERENCES conversations(id),
            user_id                 INTEGER NOT NULL,
            last_read_message_id    INTEGER NOT NULL,
            read_at                 INTEGER NOT NULL,
            PRIMARY KEY (conversation_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS typing_status (
            conversation_id INTEGER NOT NULL REFERENCES conversations(id),
            user_id         INTEGER NOT NULL,
            expires_at      INTEGER NOT NULL,
            PRIMARY KEY (conversation_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_typing_expires
            ON typing_status(expires_at);

        CREATE TABLE IF NOT EXISTS user_online_status (
            user_id             INTEGER PRIMARY KEY,
            last_heartbeat_at   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS conversation_settings (
            conversation_id INTEGER NOT NULL REFERENCES conversations(id),
            user_id         INTEGER NOT NULL,
            archived        INTEGER NOT NULL DEFAULT 0,
            muted           INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (conversation_id, user_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
