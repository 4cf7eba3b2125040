//! HTTP handlers.
//!
//! - `chat`: submit a message, delete a chat, messages, visibility, trailing delete
//! - `stream`: resume or replay the latest assistant turn
//! - `history`: the caller's chats
//! - `vote`: message votes
//! - `business`: business-function catalogue
//! - `health`: health and readiness

pub mod business;
pub mod chat;
pub mod health;
pub mod history;
pub mod stream;
pub mod vote;

// Re-export everything (including utoipa __path_* types needed by OpenApi derive)
pub use business::*;
pub use chat::*;
pub use health::*;
pub use history::*;
pub use stream::*;
pub use vote::*;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use uuid::Uuid;

use crate::error::{ChatError, Surface};
use crate::identity::{authorize_chat, load_chat_and_user, resolve_session_user};
use crate::models::Chat;
use crate::state::AppState;

// ── Shared helpers ────────────────────────────────────────────────────────

/// Malformed ids are a bad request, not a miss.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ChatError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ChatError::bad_request().with_cause(format!("invalid id: {raw}")))
}

/// Unwrap a JSON body, mapping any rejection to `bad_request:api`.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ChatError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ChatError::bad_request().with_cause(rejection.body_text()))
}

/// Load a chat the caller may act on.
///
/// Missing chats fail before any guest is provisioned. Otherwise the session
/// user is resolved (reusing the chat's guest owner when possible) and the
/// ownership check runs, adopting orphaned chats.
pub(crate) async fn owned_chat(
    state: &AppState,
    session_user_id: Uuid,
    chat_id: Uuid,
    surface: Surface,
) -> Result<(Chat, Uuid), ChatError> {
    let store = state.store.as_ref();
    let (chat, user) = load_chat_and_user(store, chat_id, session_user_id).await?;
    let mut chat = chat.ok_or_else(|| ChatError::not_found(not_found_surface(surface)))?;

    let resolved = resolve_session_user(store, session_user_id, user.as_ref(), Some(&chat)).await?;
    if authorize_chat(store, &chat, resolved.id, surface).await? {
        chat.user_id = resolved.id;
    }
    Ok((chat, resolved.id))
}

/// Like [`owned_chat`], but public chats are readable by any session; the
/// ownership rules apply to private chats only.
pub(crate) async fn readable_chat(
    state: &AppState,
    session_user_id: Uuid,
    chat_id: Uuid,
    surface: Surface,
) -> Result<Chat, ChatError> {
    let store = state.store.as_ref();
    let (chat, user) = load_chat_and_user(store, chat_id, session_user_id).await?;
    let mut chat = chat.ok_or_else(|| ChatError::not_found(not_found_surface(surface)))?;

    let resolved = resolve_session_user(store, session_user_id, user.as_ref(), Some(&chat)).await?;
    if chat.visibility == crate::models::Visibility::Private
        && authorize_chat(store, &chat, resolved.id, surface).await?
    {
        chat.user_id = resolved.id;
    }
    Ok(chat)
}

/// A missing chat is reported on the chat surface, except for votes.
fn not_found_surface(surface: Surface) -> Surface {
    match surface {
        Surface::Vote => Surface::Vote,
        _ => Surface::Chat,
    }
}
