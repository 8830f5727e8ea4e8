use chrono::{DateTime, Utc};
use tracing::warn;

use courier_db::models::{
    AttachmentRow, ConversationRow, ConversationSummaryRow, MessageRow, SettingsRow, StoredMessage,
};
use courier_types::models::{
    Attachment, Conversation, ConversationSettings, ConversationSummary, MessageView, UserId,
};

/// Row-to-wire conversions. The store keeps unix milliseconds; the API
/// speaks RFC 3339 via chrono.

pub(crate) fn ts(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(|| {
        warn!("Timestamp {} out of range", ms);
        DateTime::default()
    })
}

pub(crate) fn conversation_view(row: &ConversationRow) -> Conversation {
    Conversation {
        id: row.id,
        participant_low: row.participant_low,
        participant_high: row.participant_high,
        created_at: ts(row.created_at),
        last_message_at: ts(row.last_message_at),
        last_message_id: row.last_message_id,
    }
}

pub(crate) fn attachment_view(row: AttachmentRow) -> Attachment {
    Attachment {
        id: row.id,
        message_id: row.message_id,
        storage_ref: row.storage_ref,
        mime_type: row.mime_type,
        size_bytes: row.size_bytes,
    }
}

pub(crate) fn message_view(row: MessageRow, attachments: Vec<AttachmentRow>) -> MessageView {
    MessageView {
        id: row.id,
        conversation_id: row.conversation_id,
        sender_id: row.sender_id,
        deleted: row.deleted_at.is_some(),
        body: row.body,
        created_at: ts(row.created_at),
        edited_at: row.edited_at.map(ts),
        attachments: attachments.into_iter().map(attachment_view).collect(),
    }
}

pub(crate) fn stored_message_view(stored: StoredMessage) -> MessageView {
    message_view(stored.message, stored.attachments)
}

pub(crate) fn settings_view(row: SettingsRow) -> ConversationSettings {
    ConversationSettings {
        archived: row.archived,
        muted: row.muted,
    }
}

pub(crate) fn summary_view(
    row: ConversationSummaryRow,
    viewer: UserId,
    peer_online: bool,
) -> ConversationSummary {
    let peer_id = row.conversation.peer_of(viewer);
    ConversationSummary {
        conversation: conversation_view(&row.conversation),
        peer_id,
        peer_online,
        last_message: row.last_message.map(|m| message_view(m, vec![])),
        unread_count: row.unread_count,
        settings: settings_view(row.settings),
    }
}
