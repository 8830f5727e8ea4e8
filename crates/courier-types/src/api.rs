use serde::{Deserialize, Serialize};

use crate::models::{ConversationId, UserId};

// -- JWT Claims --

/// JWT claims shared across courier-api (REST middleware) and
/// courier-gateway (WebSocket Identify). Canonical definition lives here in
/// courier-types to eliminate duplication. Token issuance is handled by the
/// platform's auth service; this core only validates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub exp: usize,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenConversationRequest {
    pub peer_id: UserId,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachmentUpload {
    pub storage_ref: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

// -- Presence --

#[derive(Debug, Serialize)]
pub struct TypingUsersResponse {
    pub conversation_id: ConversationId,
    pub user_ids: Vec<UserId>,
}

#[derive(Debug, Serialize)]
pub struct OnlineStatusResponse {
    pub user_id: UserId,
    pub online: bool,
}

// -- Settings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSettingsRequest {
    pub archived: Option<bool>,
    pub muted: Option<bool>,
}
