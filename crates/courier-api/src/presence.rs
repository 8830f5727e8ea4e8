use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::error;

use courier_types::api::{Claims, OnlineStatusResponse, TypingUsersResponse};
use courier_types::events::GatewayEvent;

use crate::error::status_for;
use crate::state::AppState;

/// Record that the caller is typing; the TTL is re-armed on every signal
/// and expiry is handled by read-time filtering plus the scheduled sweep.
pub async fn set_typing(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub;
    let ttl_secs = state.config.typing_ttl_secs;

    let peer = tokio::task::spawn_blocking(move || {
        let conv = db.conversation_for_participant(conversation_id, user_id)?;
        db.set_typing(
            conversation_id,
            user_id,
            ttl_secs,
            Utc::now().timestamp_millis(),
        )?;
        Ok::<_, courier_db::CoreError>(conv.peer_of(user_id))
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
            GatewayEvent::TypingStart {
                conversation_id,
                user_id,
            },
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Who is typing in a conversation right now (unexpired rows only).
pub async fn get_typing(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let user_ids = tokio::task::spawn_blocking(move || {
        db.conversation_for_participant(conversation_id, user_id)?;
        db.list_typing_users(conversation_id, Utc::now().timestamp_millis())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(status_for)?;

    Ok(Json(TypingUsersResponse {
        conversation_id,
        user_ids,
    }))
}

/// Refresh the caller's heartbeat. There is no corresponding "offline"
/// endpoint: staleness is the only way offline happens.
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub;

    tokio::task::spawn_blocking(move || db.heartbeat(user_id, Utc::now().timestamp_millis()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(status_for)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_presence(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let stale_secs = state.config.online_stale_secs;

    let online = tokio::task::spawn_blocking(move || {
        db.is_online(user_id, stale_secs, Utc::now().timestamp_millis())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(status_for)?;

    Ok(Json(OnlineStatusResponse { user_id, online }))
}
