use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::error;

use courier_db::models::NewAttachment;
use courier_types::api::{Claims, SendMessageRequest};
use courier_types::events::GatewayEvent;
use courier_types::models::MessageView;

use crate::error::status_for;
use crate::state::AppState;
use crate::views;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Keyset pagination — pass the id of the oldest message from the
    /// previous page to fetch older messages.
    pub before: Option<i64>,
}

fn default_limit() -> u32 {
    50
}

/// Append a message (plus attachment references) to a conversation. The
/// store commits message, attachments, and the conversation pointer
/// atomically; the gateway event afterwards is fire-and-forget and never
/// rolls the write back.
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let sender_id = claims.sub;
    let attachments: Vec<NewAttachment> = req
        .attachments
        .iter()
        .map(|a| NewAttachment {
            storage_ref: a.storage_ref.clone(),
            mime_type: a.mime_type.clone(),
            size_bytes: a.size_bytes,
        })
        .collect();

    let (recipient_id, stored) = tokio::task::spawn_blocking(move || {
        let conv = db.conversation_for_participant(conversation_id, sender_id)?;
        let stored = db.send_message(
            conversation_id,
            sender_id,
            &req.body,
            &attachments,
            Utc::now().timestamp_millis(),
        )?;
        Ok::<_, courier_db::CoreError>((conv.peer_of(sender_id), stored))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(status_for)?;

    state
        .dispatcher
        .send_to_user(
            recipient_id,
            GatewayEvent::MessageCreate {
                conversation_id,
                message_id: stored.message.id,
                sender_id,
                recipient_id,
                timestamp: views::ts(stored.message.created_at),
            },
        )
        .await;

    Ok((StatusCode::CREATED, Json(views::stored_message_view(stored))))
}

/// Newest-first page of a conversation's messages. Soft-deleted entries
/// appear as tombstones with a blank body.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub;
    let limit = query.limit.min(100);
    let before = query.before;

    let rows = tokio::task::spawn_blocking(move || {
        db.conversation_for_participant(conversation_id, user_id)?;
        db.list_messages(conversation_id, before, limit)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(status_for)?;

    let messages: Vec<MessageView> = rows.into_iter().map(views::stored_message_view).collect();
    Ok(Json(messages))
}

/// Soft-delete a message. Only the sender may delete; the row stays as a
/// tombstone and the conversation's last-message pointer keeps its place.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let requester_id = claims.sub;

    let (conversation_id, peer) = tokio::task::spawn_blocking(move || {
        let row = db.soft_delete_message(message_id, requester_id, Utc::now().timestamp_millis())?;
        let conv = db.conversation_for_participant(row.conversation_id, requester_id)?;
        Ok::<_, courier_db::CoreError>((row.conversation_id, conv.peer_of(requester_id)))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(status_for)?;

    state
        .dispatcher
        .send_to_user(
            peer,
            GatewayEvent::MessageDelete {
                conversation_id,
                message_id,
            },
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
