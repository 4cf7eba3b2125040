//! Message votes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;

use super::{json_body, owned_chat, parse_id};
use crate::auth::Session;
use crate::error::{ChatError, Surface};
use crate::models::{Role, Vote, VoteQuery, VoteRequest, VoteType};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/vote",
    tag = "vote",
    params(("chatId" = String, Query, description = "Chat id")),
    responses((status = 200, description = "Votes of the chat", body = Vec<Vote>))
)]
pub async fn get_votes(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<VoteQuery>,
) -> Result<Json<Vec<Vote>>, ChatError> {
    let raw = query.chat_id.ok_or_else(ChatError::bad_request)?;
    let chat_id = parse_id(&raw)?;
    let session_user_id = session.require(Surface::Vote)?;

    owned_chat(&state, session_user_id, chat_id, Surface::Vote).await?;

    let votes = state
        .store
        .votes_by_chat(chat_id)
        .await
        .map_err(ChatError::database)?;
    Ok(Json(votes))
}

#[utoipa::path(
    patch,
    path = "/api/vote",
    tag = "vote",
    request_body = VoteRequest,
    responses((status = 200, description = "Recorded vote", body = Vote))
)]
pub async fn vote_message(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<Vote>, ChatError> {
    let body = json_body(payload)?;
    let session_user_id = session.require(Surface::Vote)?;

    owned_chat(&state, session_user_id, body.chat_id, Surface::Vote).await?;

    // Only assistant messages of this chat can be voted on.
    let message = state
        .store
        .get_message(body.message_id)
        .await
        .map_err(ChatError::database)?
        .filter(|m| m.chat_id == body.chat_id && m.role == Role::Assistant)
        .ok_or_else(|| ChatError::not_found(Surface::Vote))?;

    let is_upvoted = body.vote == VoteType::Up;
    state
        .store
        .vote_message(body.chat_id, message.id, is_upvoted)
        .await
        .map_err(ChatError::database)?;
    tracing::info!(chat = %body.chat_id, message = %message.id, is_upvoted, "vote: recorded");

    Ok(Json(Vote {
        chat_id: body.chat_id,
        message_id: message.id,
        is_upvoted,
    }))
}
