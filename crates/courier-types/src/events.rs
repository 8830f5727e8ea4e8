use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ConversationId, MessageId, UserId};

/// Events sent over the WebSocket gateway. Conversation events are
/// delivered targeted to the other participant; presence updates are
/// broadcast to every connected client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: UserId },

    /// A new message was committed to a conversation
    MessageCreate {
        conversation_id: ConversationId,
        message_id: MessageId,
        sender_id: UserId,
        recipient_id: UserId,
        timestamp: DateTime<Utc>,
    },

    /// A message was soft-deleted by its sender
    MessageDelete {
        conversation_id: ConversationId,
        message_id: MessageId,
    },

    /// A participant caught up on a conversation
    ConversationRead {
        conversation_id: ConversationId,
        user_id: UserId,
    },

    /// A user started typing in a conversation
    TypingStart {
        conversation_id: ConversationId,
        user_id: UserId,
    },

    /// A user explicitly stopped typing (expiry needs no event; clients
    /// apply the same TTL the server does)
    TypingStop {
        conversation_id: ConversationId,
        user_id: UserId,
    },

    /// A user's gateway connection came up or went away
    PresenceUpdate { user_id: UserId, online: bool },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Indicate typing in a conversation; clients debounce, the server
    /// re-arms the TTL on every signal
    StartTyping { conversation_id: ConversationId },

    /// Explicitly clear the typing indicator
    StopTyping { conversation_id: ConversationId },

    /// Refresh the caller's online-status heartbeat
    Heartbeat,
}
