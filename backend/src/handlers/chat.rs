//! Chat submission and chat management endpoints.

use std::convert::Infallible;
use std::pin::pin;

use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::{json_body, owned_chat, parse_id, readable_chat};
use crate::auth::Session;
use crate::error::{ChatError, Surface};
use crate::identity::{authorize_chat, load_chat_and_user, resolve_session_user};
use crate::models::*;
use crate::n8n::{normalize_reply, StreamAccumulator, WebhookRequest, WebhookResponse};
use crate::resumable::StreamPublisher;
use crate::state::AppState;
use crate::ui_stream::{done_frame, sse_response, UiChunk};

pub(crate) const MAX_TITLE_CHARS: usize = 50;
const DEFAULT_TITLE: &str = "New Chat";

/// Chat title from the first user message: its first 50 characters.
pub fn derive_title(text: &str) -> String {
    let title: String = text.trim().chars().take(MAX_TITLE_CHARS).collect();
    let title = title.trim_end();
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title.to_string()
    }
}

fn assistant_message(id: Uuid, text: &str) -> UiMessage {
    UiMessage {
        id,
        role: Role::Assistant,
        parts: vec![MessagePart::text(text)],
    }
}

fn append_frame(id: Uuid, text: &str) -> Option<Bytes> {
    match UiChunk::append_message(&assistant_message(id, text)) {
        Ok(chunk) => Some(chunk.to_frame()),
        Err(e) => {
            tracing::error!("chat: failed to encode appendMessage: {}", e);
            None
        }
    }
}

/// Persist the assistant turn. Failure is logged and swallowed: the reply is
/// still delivered to the client.
async fn save_assistant_message(state: &AppState, chat_id: Uuid, id: Uuid, text: &str) {
    let message = DbMessage {
        id,
        chat_id,
        role: Role::Assistant,
        parts: vec![MessagePart::text(text)],
        attachments: Vec::new(),
        created_at: Utc::now(),
    };
    match state.store.save_messages(&[message]).await {
        Ok(()) => tracing::debug!(chat = %chat_id, message = %id, "chat: assistant message saved"),
        Err(e) => tracing::error!(chat = %chat_id, "chat: failed to save assistant message: {}", e),
    }
}

/// End a registered stream that will never carry a reply, so clients that
/// already reattached see an error chunk and `[DONE]` instead of hanging.
fn abort_stream(publisher: Option<StreamPublisher>) {
    if let Some(publisher) = publisher {
        publisher.publish(UiChunk::error(ChatError::offline(Surface::Chat).message).to_frame());
        publisher.publish(done_frame());
    }
}

/// Run `frames` to completion on its own task, mirroring every frame into
/// the resumable registry and, while it is still connected, to the client.
fn spawn_stream<S>(stream_id: Uuid, publisher: Option<StreamPublisher>, frames: S) -> Response
where
    S: Stream<Item = Bytes> + Send + 'static,
{
    let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(64);

    tokio::spawn(async move {
        let mut frames = pin!(frames);
        let mut client_connected = true;
        while let Some(frame) = frames.next().await {
            if let Some(publisher) = &publisher {
                publisher.publish(frame.clone());
            }
            if client_connected && tx.send(frame).await.is_err() {
                tracing::debug!(stream = %stream_id, "chat: client disconnected, generation continues");
                client_connected = false;
            }
        }
    });

    let body = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    sse_response(Body::from_stream(body))
}

/// Frames for a streaming workflow reply: one `appendMessage` per change of
/// the decoded text, the final text once more after persisting it, `[DONE]`.
fn relay_workflow_stream(
    state: AppState,
    upstream: reqwest::Response,
    chat_id: Uuid,
    assistant_id: Uuid,
) -> impl Stream<Item = Bytes> + Send + 'static {
    async_stream::stream! {
        let idle_timeout = state.gateway.timeout();
        let mut accumulator = StreamAccumulator::new();
        let mut bytes = upstream.bytes_stream();

        loop {
            let next = match tokio::time::timeout(idle_timeout, bytes.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::warn!(chat = %chat_id, "n8n: stream idle for {}s, closing", idle_timeout.as_secs());
                    break;
                }
            };
            match next {
                Some(Ok(chunk)) => {
                    if let Some(text) = accumulator.push_chunk(&chunk) {
                        if let Some(frame) = append_frame(assistant_id, &text) {
                            yield frame;
                        }
                    }
                    if accumulator.overflowed() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(chat = %chat_id, "n8n: stream read failed: {}", e);
                    break;
                }
                None => break,
            }
        }

        match accumulator.finish() {
            Some(text) => {
                save_assistant_message(&state, chat_id, assistant_id, &text).await;
                if let Some(frame) = append_frame(assistant_id, &text) {
                    yield frame;
                }
            }
            None => {
                tracing::error!(chat = %chat_id, "n8n: stream ended without any response text");
                yield UiChunk::error(ChatError::offline(Surface::Chat).message).to_frame();
            }
        }
        yield done_frame();
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  POST /api/chat
// ═══════════════════════════════════════════════════════════════════════

#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = PostRequestBody,
    responses(
        (status = 200, description = "UI message stream (text/event-stream)"),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "No session"),
        (status = 403, description = "Chat owned by another user"),
        (status = 503, description = "Workflow unreachable or returned no usable reply")
    )
)]
pub async fn post_chat(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<PostRequestBody>, JsonRejection>,
) -> Result<Response, ChatError> {
    let body = json_body(payload)?;
    body.validate()
        .map_err(|reason| ChatError::bad_request().with_cause(reason))?;
    let message_text = text_from_parts(&body.message.parts);
    if message_text.trim().is_empty() {
        return Err(ChatError::bad_request().with_cause("message has no text"));
    }
    let session_user_id = session.require(Surface::Chat)?;
    let business_function = body.business_function.unwrap_or_default();
    let chat_id = body.id;

    tracing::info!(chat = %chat_id, business_function = %business_function, "chat: message received");
    if state.config.development {
        tracing::debug!("chat: incoming message: {:?}", body.message);
    }

    let store = state.store.as_ref();
    let (chat, user) = load_chat_and_user(store, chat_id, session_user_id).await?;
    let resolved = resolve_session_user(store, session_user_id, user.as_ref(), chat.as_ref()).await?;

    match &chat {
        Some(chat) => {
            authorize_chat(store, chat, resolved.id, Surface::Chat).await?;
        }
        None => {
            let chat = Chat {
                id: chat_id,
                user_id: resolved.id,
                title: derive_title(&message_text),
                visibility: body.selected_visibility_type,
                created_at: Utc::now(),
            };
            store.save_chat(&chat).await.map_err(ChatError::database)?;
            tracing::info!(chat = %chat_id, title = %chat.title, "chat: created");
        }
    }

    store
        .save_messages(&[DbMessage {
            id: body.message.id,
            chat_id,
            role: Role::User,
            parts: body.message.parts.clone(),
            attachments: Vec::new(),
            created_at: Utc::now(),
        }])
        .await
        .map_err(ChatError::database)?;

    let stream_id = Uuid::new_v4();
    store
        .create_stream_id(stream_id, chat_id)
        .await
        .map_err(ChatError::database)?;
    // Registered before the webhook call so a reload during the wait can reattach.
    let publisher = state.streams.publisher(stream_id);

    let request = WebhookRequest::new(message_text, chat_id, resolved.id, business_function);
    let reply = match state.gateway.dispatch(business_function, &request).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(chat = %chat_id, "n8n: {}", e);
            abort_stream(publisher);
            return Err(ChatError::offline(Surface::Chat));
        }
    };

    let assistant_id = Uuid::new_v4();
    match reply {
        WebhookResponse::Streaming(upstream) => {
            let frames = relay_workflow_stream(state.clone(), upstream, chat_id, assistant_id);
            Ok(spawn_stream(stream_id, publisher, frames))
        }
        WebhookResponse::Buffered(payload) => {
            let reply = match normalize_reply(payload) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(chat = %chat_id, "n8n: {}", e);
                    abort_stream(publisher);
                    return Err(ChatError::offline(Surface::Chat));
                }
            };
            reply.warn_on_id_mismatch(chat_id, resolved.id);

            save_assistant_message(&state, chat_id, assistant_id, &reply.response).await;

            let frames: Vec<Bytes> = append_frame(assistant_id, &reply.response)
                .into_iter()
                .chain(std::iter::once(done_frame()))
                .collect();
            Ok(spawn_stream(stream_id, publisher, futures_util::stream::iter(frames)))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  DELETE /api/chat?id=
// ═══════════════════════════════════════════════════════════════════════

#[utoipa::path(
    delete,
    path = "/api/chat",
    tag = "chat",
    params(("id" = String, Query, description = "Chat id")),
    responses(
        (status = 200, description = "Deleted chat", body = Chat),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn delete_chat(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<DeleteChatQuery>,
) -> Result<Json<Chat>, ChatError> {
    let raw = query.id.ok_or_else(ChatError::bad_request)?;
    let chat_id = parse_id(&raw)?;
    let session_user_id = session.require(Surface::Chat)?;

    owned_chat(&state, session_user_id, chat_id, Surface::Chat).await?;

    let deleted = state
        .store
        .delete_chat(chat_id)
        .await
        .map_err(ChatError::database)?
        .ok_or_else(|| ChatError::not_found(Surface::Chat))?;
    tracing::info!(chat = %chat_id, "chat: deleted");
    Ok(Json(deleted))
}

// ═══════════════════════════════════════════════════════════════════════
//  GET /api/chat/{id}/messages
// ═══════════════════════════════════════════════════════════════════════

#[utoipa::path(
    get,
    path = "/api/chat/{id}/messages",
    tag = "chat",
    params(("id" = String, Path, description = "Chat id")),
    responses((status = 200, description = "Messages, oldest first", body = Vec<DbMessage>))
)]
pub async fn chat_messages(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Vec<DbMessage>>, ChatError> {
    let chat_id = parse_id(&id)?;
    let session_user_id = session.require(Surface::Chat)?;
    readable_chat(&state, session_user_id, chat_id, Surface::Chat).await?;

    let messages = state
        .store
        .messages_by_chat(chat_id)
        .await
        .map_err(ChatError::database)?;
    Ok(Json(messages))
}

// ═══════════════════════════════════════════════════════════════════════
//  PATCH /api/chat/{id}/visibility
// ═══════════════════════════════════════════════════════════════════════

#[utoipa::path(
    patch,
    path = "/api/chat/{id}/visibility",
    tag = "chat",
    params(("id" = String, Path, description = "Chat id")),
    request_body = VisibilityRequest,
    responses((status = 200, description = "Updated chat", body = Chat))
)]
pub async fn update_visibility(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    payload: Result<Json<VisibilityRequest>, JsonRejection>,
) -> Result<Json<Chat>, ChatError> {
    let chat_id = parse_id(&id)?;
    let body = json_body(payload)?;
    let session_user_id = session.require(Surface::Chat)?;

    let (mut chat, _) = owned_chat(&state, session_user_id, chat_id, Surface::Chat).await?;
    let updated = state
        .store
        .update_chat_visibility(chat_id, body.visibility)
        .await
        .map_err(ChatError::database)?;
    if !updated {
        return Err(ChatError::not_found(Surface::Chat));
    }
    chat.visibility = body.visibility;
    Ok(Json(chat))
}

// ═══════════════════════════════════════════════════════════════════════
//  DELETE /api/messages/{id}/trailing
// ═══════════════════════════════════════════════════════════════════════

#[utoipa::path(
    delete,
    path = "/api/messages/{id}/trailing",
    tag = "chat",
    params(("id" = String, Path, description = "Message id")),
    responses((status = 200, description = "Number of messages removed"))
)]
pub async fn delete_trailing_messages(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Value>, ChatError> {
    let message_id = parse_id(&id)?;
    let session_user_id = session.require(Surface::Chat)?;

    let message = state
        .store
        .get_message(message_id)
        .await
        .map_err(ChatError::database)?
        .ok_or_else(|| ChatError::not_found(Surface::Chat))?;

    owned_chat(&state, session_user_id, message.chat_id, Surface::Chat).await?;

    let deleted = state
        .store
        .delete_messages_after(message.chat_id, message.created_at)
        .await
        .map_err(ChatError::database)?;
    tracing::info!(chat = %message.chat_id, deleted, "chat: trailing messages removed");
    Ok(Json(json!({ "deleted": deleted })))
}
