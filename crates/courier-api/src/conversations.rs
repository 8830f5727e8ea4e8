use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::error;

use courier_types::api::{Claims, OpenConversationRequest};
use courier_types::events::GatewayEvent;
use courier_types::models::ConversationSummary;

use crate::error::status_for;
use crate::state::AppState;
use crate::views;

/// Get-or-create the conversation between the caller and a peer. Safe to
/// call from both sides concurrently; both converge on the same row.
pub async fn open_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<OpenConversationRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let row = tokio::task::spawn_blocking(move || {
        db.get_or_create_conversation(user_id, req.peer_id, Utc::now().timestamp_millis())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(status_for)?;

    Ok(Json(views::conversation_view(&row)))
}

/// The caller's conversation list: last message preview, unread count,
/// per-viewer settings, and whether the peer is currently online — newest
/// activity first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub;
    let stale_secs = state.config.online_stale_secs;

    let (rows, online) = tokio::task::spawn_blocking(move || {
        let rows = db.list_conversations_for_user(user_id)?;
        let peers: Vec<i64> = rows.iter().map(|r| r.conversation.peer_of(user_id)).collect();
        let online = db.online_users(&peers, stale_secs, Utc::now().timestamp_millis())?;
        Ok::<_, courier_db::CoreError>((rows, online))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(status_for)?;

    let summaries: Vec<ConversationSummary> = rows
        .into_iter()
        .map(|row| {
            let peer_online = online.contains(&row.conversation.peer_of(user_id));
            views::summary_view(row, user_id, peer_online)
        })
        .collect();

    Ok(Json(summaries))
}

/// Advance the caller's read cursor to the conversation's latest message.
/// Idempotent; a stale cursor position never regresses.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let peer = tokio::task::spawn_blocking(move || {
        let conv = db.conversation_for_participant(conversation_id, user_id)?;
        db.mark_conversation_read(conversation_id, user_id, Utc::now().timestamp_millis())?;
        Ok::<_, courier_db::CoreError>(conv.peer_of(user_id))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(status_for)?;

    // Best-effort read receipt to the other participant.
    state
        .dispatcher
        .send_to_user(
            peer,
            GatewayEvent::ConversationRead {
                conversation_id,
                user_id,
            },
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
