//! Persistence seam.
//!
//! Handlers only talk to [`ChatStore`]. Two implementations exist:
//! - [`PgStore`]: Postgres via sqlx (production)
//! - [`MemoryStore`]: process-local maps, used when no `DATABASE_URL` is
//!   configured and by the test suite

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Chat, DbMessage, User, Visibility, Vote};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("chat {0} does not exist")]
    MissingChat(Uuid),
    #[error("message {0} already exists")]
    DuplicateMessage(Uuid),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Synthetic email for an auto-provisioned guest.
pub(crate) fn guest_email() -> String {
    format!("{}{}", crate::models::GUEST_EMAIL_PREFIX, Utc::now().timestamp_millis())
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Short backend name for health output.
    fn kind(&self) -> &'static str;

    async fn ping(&self) -> bool;

    // ── Users ──
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn create_user(&self, email: Option<&str>) -> StoreResult<User>;
    async fn create_guest_user(&self) -> StoreResult<User>;

    // ── Chats ──
    async fn get_chat(&self, id: Uuid) -> StoreResult<Option<Chat>>;
    async fn save_chat(&self, chat: &Chat) -> StoreResult<()>;
    async fn update_chat_owner(&self, chat_id: Uuid, user_id: Uuid) -> StoreResult<()>;
    async fn update_chat_visibility(&self, chat_id: Uuid, visibility: Visibility) -> StoreResult<bool>;
    /// Removes the chat with its messages, votes and stream ids; returns the deleted row.
    async fn delete_chat(&self, id: Uuid) -> StoreResult<Option<Chat>>;
    /// Newest first.
    async fn chats_by_user(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<Chat>>;

    // ── Messages ──
    async fn save_messages(&self, messages: &[DbMessage]) -> StoreResult<()>;
    /// Oldest first.
    async fn messages_by_chat(&self, chat_id: Uuid) -> StoreResult<Vec<DbMessage>>;
    async fn get_message(&self, id: Uuid) -> StoreResult<Option<DbMessage>>;
    /// Deletes every message of the chat created at or after `after`.
    async fn delete_messages_after(&self, chat_id: Uuid, after: DateTime<Utc>) -> StoreResult<u64>;

    // ── Stream ids ──
    async fn create_stream_id(&self, stream_id: Uuid, chat_id: Uuid) -> StoreResult<()>;
    /// Oldest first; the last entry is the most recent stream.
    async fn stream_ids_by_chat(&self, chat_id: Uuid) -> StoreResult<Vec<Uuid>>;

    // ── Votes ──
    async fn votes_by_chat(&self, chat_id: Uuid) -> StoreResult<Vec<Vote>>;
    async fn vote_message(&self, chat_id: Uuid, message_id: Uuid, is_upvoted: bool) -> StoreResult<()>;
}
