//! The caller's chat list.

use axum::extract::{Query, State};
use axum::Json;

use crate::auth::Session;
use crate::error::{ChatError, Surface};
use crate::models::{Chat, HistoryQuery};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

#[utoipa::path(
    get,
    path = "/api/history",
    tag = "history",
    params(("limit" = Option<i64>, Query, description = "Max chats (1-100, default 20)")),
    responses((status = 200, description = "Chats, newest first", body = Vec<Chat>))
)]
pub async fn list_history(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Chat>>, ChatError> {
    let user_id = session.require(Surface::History)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    // A session whose user row is gone has no chats; nothing to provision for a read.
    let user = state.store.get_user(user_id).await.map_err(ChatError::database)?;
    if user.is_none() {
        return Ok(Json(Vec::new()));
    }

    let chats = state
        .store
        .chats_by_user(user_id, limit)
        .await
        .map_err(ChatError::database)?;
    Ok(Json(chats))
}
