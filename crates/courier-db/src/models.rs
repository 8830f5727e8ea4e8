/// Database row types — these map directly to SQLite rows. Distinct from
/// the courier-types API models to keep the DB layer independent; all
/// timestamps here are unix milliseconds.

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: i64,
    pub participant_low: i64,
    pub participant_high: i64,
    pub created_at: i64,
    pub last_message_at: i64,
    pub last_message_id: Option<i64>,
}

impl ConversationRow {
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.participant_low == user_id || self.participant_high == user_id
    }

    pub fn peer_of(&self, user_id: i64) -> i64 {
        if self.participant_low == user_id {
            self.participant_high
        } else {
            self.participant_low
        }
    }
}

/// Soft-deleted rows keep their place in the sequence; queries blank the
/// body at read time so deleted content never leaves the store.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub body: String,
    pub created_at: i64,
    pub edited_at: Option<i64>,
    pub deleted_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AttachmentRow {
    pub id: i64,
    pub message_id: i64,
    pub storage_ref: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

/// Attachment metadata supplied at send time, before a row id exists.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub storage_ref: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

/// A message together with its attachments, as returned by the log.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub message: MessageRow,
    pub attachments: Vec<AttachmentRow>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsRow {
    pub archived: bool,
    pub muted: bool,
}

/// One row of a user's conversation list.
#[derive(Debug, Clone)]
pub struct ConversationSummaryRow {
    pub conversation: ConversationRow,
    pub last_message: Option<MessageRow>,
    pub unread_count: i64,
    pub settings: SettingsRow,
}
