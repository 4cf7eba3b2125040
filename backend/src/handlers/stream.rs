//! Resume endpoint: reattach to a live stream or replay a just-finished turn.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;

use super::{parse_id, readable_chat};
use crate::auth::Session;
use crate::error::{ChatError, Surface};
use crate::models::{DbMessage, Role};
use crate::state::AppState;
use crate::ui_stream::{chunks_response, empty_response, sse_response, UiChunk};

/// A finished assistant turn younger than this is replayed to a resuming
/// client that missed the live stream.
pub const REPLAY_WINDOW_SECS: i64 = 15;

/// The message to replay, if the conversation ends with a recent assistant turn.
pub(crate) fn replay_candidate(messages: &[DbMessage], now: DateTime<Utc>) -> Option<&DbMessage> {
    let last = messages.last()?;
    if last.role != Role::Assistant {
        return None;
    }
    let age = now.signed_duration_since(last.created_at).num_seconds();
    (age <= REPLAY_WINDOW_SECS).then_some(last)
}

// ═══════════════════════════════════════════════════════════════════════
//  GET /api/chat/{id}/stream
// ═══════════════════════════════════════════════════════════════════════

#[utoipa::path(
    get,
    path = "/api/chat/{id}/stream",
    tag = "chat",
    params(("id" = String, Path, description = "Chat id")),
    responses(
        (status = 200, description = "UI message stream (possibly empty)"),
        (status = 204, description = "Resumable streams are disabled"),
        (status = 404, description = "Chat or stream not found")
    )
)]
pub async fn resume_stream(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Response, ChatError> {
    let requested_at = Utc::now();

    if !state.streams.is_enabled() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let chat_id = parse_id(&id)?;
    let session_user_id = session.require(Surface::Chat)?;
    readable_chat(&state, session_user_id, chat_id, Surface::Chat).await?;

    let stream_ids = state
        .store
        .stream_ids_by_chat(chat_id)
        .await
        .map_err(ChatError::database)?;
    let stream_id = *stream_ids
        .last()
        .ok_or_else(|| ChatError::not_found(Surface::Stream))?;

    if let Some(live) = state.streams.resume(stream_id) {
        tracing::info!(chat = %chat_id, stream = %stream_id, "stream: resuming live stream");
        return Ok(sse_response(Body::from_stream(live.map(Ok::<_, Infallible>))));
    }

    let messages = state
        .store
        .messages_by_chat(chat_id)
        .await
        .map_err(ChatError::database)?;

    match replay_candidate(&messages, requested_at) {
        Some(message) => {
            tracing::info!(chat = %chat_id, message = %message.id, "stream: replaying recent assistant message");
            match UiChunk::append_message(message) {
                Ok(chunk) => Ok(chunks_response(&[chunk])),
                Err(e) => {
                    tracing::error!("stream: failed to encode replay: {}", e);
                    Ok(empty_response())
                }
            }
        }
        None => Ok(empty_response()),
    }
}
