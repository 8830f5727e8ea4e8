use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ids are the platform's serial integer ids. Message ids are strictly
/// increasing within a conversation, so id order is message order.
pub type UserId = i64;
pub type ConversationId = i64;
pub type MessageId = i64;

/// The unique thread for an unordered pair of participants.
/// `participant_low < participant_high` always holds, so each pair maps to
/// exactly one row regardless of who opened the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participant_low: UserId,
    pub participant_high: UserId,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub last_message_id: Option<MessageId>,
}

impl Conversation {
    /// The participant that is not `user_id`.
    pub fn peer_of(&self, user_id: UserId) -> UserId {
        if self.participant_low == user_id {
            self.participant_high
        } else {
            self.participant_low
        }
    }
}

/// A message as served to clients. Soft-deleted messages are kept in
/// listings as tombstones: `deleted` is true and the body is blank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
}

/// Attachment metadata. The bytes live in an external store; `storage_ref`
/// is an opaque reference into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub message_id: MessageId,
    pub storage_ref: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

/// Per-viewer conversation preferences. Absence of a stored row means both
/// flags are false.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConversationSettings {
    pub archived: bool,
    pub muted: bool,
}

/// One entry of a user's conversation list, newest activity first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub peer_id: UserId,
    pub peer_online: bool,
    pub last_message: Option<MessageView>,
    pub unread_count: i64,
    pub settings: ConversationSettings,
}
