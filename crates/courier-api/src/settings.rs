use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use courier_types::api::{Claims, UpdateSettingsRequest};

use crate::error::status_for;
use crate::state::AppState;
use crate::views;

/// Update the caller's archived/muted flags for a conversation. Flags left
/// out of the request keep their stored (or default) value; the other
/// participant's view is untouched.
pub async fn update_settings(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let row = tokio::task::spawn_blocking(move || {
        db.conversation_for_participant(conversation_id, user_id)?;
        if let Some(archived) = req.archived {
            db.set_archived(conversation_id, user_id, archived)?;
        }
        if let Some(muted) = req.muted {
            db.set_muted(conversation_id, user_id, muted)?;
        }
        db.get_settings(conversation_id, user_id)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(status_for)?;

    Ok(Json(views::settings_view(row)))
}
