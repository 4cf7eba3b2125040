//! Identity resolution and chat ownership reconciliation.
//!
//! Session ids can outlive their user rows (the row was purged while the
//! browser kept its cookie). Every chat-touching route runs the same two
//! steps before it mutates anything:
//!
//! 1. [`resolve_session_user`] turns the session id into an id that is
//!    guaranteed to exist, provisioning a guest when needed.
//! 2. [`authorize_chat`] checks the chat against that id, adopting chats
//!    whose owner row is gone and refusing chats of other live users.

use uuid::Uuid;

use crate::error::{ChatError, Surface};
use crate::models::{Chat, User};
use crate::store::ChatStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    pub id: Uuid,
    /// `true` when a guest row was created for this request.
    pub provisioned: bool,
}

/// Chat lookup and session-user lookup are independent; issue them together.
pub async fn load_chat_and_user(
    store: &dyn ChatStore,
    chat_id: Uuid,
    session_user_id: Uuid,
) -> Result<(Option<Chat>, Option<User>), ChatError> {
    tokio::try_join!(store.get_chat(chat_id), store.get_user(session_user_id))
        .map_err(ChatError::database)
}

/// Return a user id that references an existing row.
///
/// `existing` is the already-fetched session user. When it is missing and the
/// target chat belongs to a guest that still exists, that guest is reused so
/// the conversation keeps its owner; otherwise a fresh guest is created.
pub async fn resolve_session_user(
    store: &dyn ChatStore,
    session_user_id: Uuid,
    existing: Option<&User>,
    chat: Option<&Chat>,
) -> Result<ResolvedUser, ChatError> {
    if existing.is_some() {
        return Ok(ResolvedUser {
            id: session_user_id,
            provisioned: false,
        });
    }

    if let Some(chat) = chat {
        let owner = store.get_user(chat.user_id).await.map_err(ChatError::database)?;
        if owner.as_ref().is_some_and(User::is_guest) {
            tracing::info!(
                session_user = %session_user_id,
                guest = %chat.user_id,
                "identity: session user missing, reusing chat's guest owner"
            );
            return Ok(ResolvedUser {
                id: chat.user_id,
                provisioned: false,
            });
        }
    }

    let guest = store.create_guest_user().await.map_err(ChatError::database)?;
    tracing::info!(
        session_user = %session_user_id,
        guest = %guest.id,
        "identity: session user missing, provisioned guest"
    );
    Ok(ResolvedUser {
        id: guest.id,
        provisioned: true,
    })
}

/// Ownership check with orphan adoption.
///
/// - owner == current user: allowed
/// - owner row still exists: forbidden
/// - owner row gone: the chat is reassigned to the current user
///
/// Returns `true` when the chat was reassigned.
pub async fn authorize_chat(
    store: &dyn ChatStore,
    chat: &Chat,
    current_user: Uuid,
    surface: Surface,
) -> Result<bool, ChatError> {
    if chat.user_id == current_user {
        return Ok(false);
    }

    let owner = store.get_user(chat.user_id).await.map_err(ChatError::database)?;
    if owner.is_some() {
        tracing::warn!(
            chat = %chat.id,
            owner = %chat.user_id,
            requester = %current_user,
            "identity: chat belongs to another user"
        );
        return Err(ChatError::forbidden(surface));
    }

    store
        .update_chat_owner(chat.id, current_user)
        .await
        .map_err(ChatError::database)?;
    tracing::info!(
        chat = %chat.id,
        previous_owner = %chat.user_id,
        new_owner = %current_user,
        "identity: adopted orphaned chat"
    );
    Ok(true)
}
