// Process-local store. Data lives as long as the process.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{guest_email, ChatStore, StoreError, StoreResult};
use crate::models::{Chat, DbMessage, StreamRecord, User, Visibility, Vote};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    chats: HashMap<Uuid, Chat>,
    /// Insertion order; reads sort by `created_at`.
    messages: Vec<DbMessage>,
    streams: Vec<StreamRecord>,
    votes: HashMap<(Uuid, Uuid), bool>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user with a caller-chosen id (session users are issued elsewhere).
    pub async fn insert_user(&self, user: User) {
        self.inner.write().await.users.insert(user.id, user);
    }

    /// Hard-delete a user row, leaving their chats orphaned.
    pub async fn remove_user(&self, id: Uuid) -> bool {
        self.inner.write().await.users.remove(&id).is_some()
    }

    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create_user(&self, email: Option<&str>) -> StoreResult<User> {
        let user = User {
            id: Uuid::new_v4(),
            email: email.map(str::to_string),
        };
        self.inner.write().await.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn create_guest_user(&self) -> StoreResult<User> {
        self.create_user(Some(&guest_email())).await
    }

    async fn get_chat(&self, id: Uuid) -> StoreResult<Option<Chat>> {
        Ok(self.inner.read().await.chats.get(&id).cloned())
    }

    async fn save_chat(&self, chat: &Chat) -> StoreResult<()> {
        self.inner.write().await.chats.insert(chat.id, chat.clone());
        Ok(())
    }

    async fn update_chat_owner(&self, chat_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let chat = inner
            .chats
            .get_mut(&chat_id)
            .ok_or(StoreError::MissingChat(chat_id))?;
        chat.user_id = user_id;
        Ok(())
    }

    async fn update_chat_visibility(&self, chat_id: Uuid, visibility: Visibility) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(match inner.chats.get_mut(&chat_id) {
            Some(chat) => {
                chat.visibility = visibility;
                true
            }
            None => false,
        })
    }

    async fn delete_chat(&self, id: Uuid) -> StoreResult<Option<Chat>> {
        let mut inner = self.inner.write().await;
        let removed = inner.chats.remove(&id);
        if removed.is_some() {
            inner.messages.retain(|m| m.chat_id != id);
            inner.streams.retain(|s| s.chat_id != id);
            inner.votes.retain(|(chat_id, _), _| *chat_id != id);
        }
        Ok(removed)
    }

    async fn chats_by_user(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<Chat>> {
        let inner = self.inner.read().await;
        let mut chats: Vec<Chat> = inner
            .chats
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        chats.truncate(limit.max(0) as usize);
        Ok(chats)
    }

    async fn save_messages(&self, messages: &[DbMessage]) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        for msg in messages {
            if !inner.chats.contains_key(&msg.chat_id) {
                return Err(StoreError::MissingChat(msg.chat_id));
            }
            if inner.messages.iter().any(|m| m.id == msg.id) {
                return Err(StoreError::DuplicateMessage(msg.id));
            }
        }
        inner.messages.extend(messages.iter().cloned());
        Ok(())
    }

    async fn messages_by_chat(&self, chat_id: Uuid) -> StoreResult<Vec<DbMessage>> {
        let inner = self.inner.read().await;
        let mut messages: Vec<DbMessage> = inner
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        // Stable: equal timestamps keep insertion order.
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn get_message(&self, id: Uuid) -> StoreResult<Option<DbMessage>> {
        Ok(self.inner.read().await.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn delete_messages_after(&self, chat_id: Uuid, after: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let doomed: Vec<Uuid> = inner
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id && m.created_at >= after)
            .map(|m| m.id)
            .collect();
        inner.messages.retain(|m| !doomed.contains(&m.id));
        inner.votes.retain(|(c, m), _| !(*c == chat_id && doomed.contains(m)));
        Ok(doomed.len() as u64)
    }

    async fn create_stream_id(&self, stream_id: Uuid, chat_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.chats.contains_key(&chat_id) {
            return Err(StoreError::MissingChat(chat_id));
        }
        inner.streams.push(StreamRecord {
            id: stream_id,
            chat_id,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn stream_ids_by_chat(&self, chat_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner
            .streams
            .iter()
            .filter(|s| s.chat_id == chat_id)
            .map(|s| s.id)
            .collect())
    }

    async fn votes_by_chat(&self, chat_id: Uuid) -> StoreResult<Vec<Vote>> {
        let inner = self.inner.read().await;
        Ok(inner
            .votes
            .iter()
            .filter(|((c, _), _)| *c == chat_id)
            .map(|((c, m), up)| Vote {
                chat_id: *c,
                message_id: *m,
                is_upvoted: *up,
            })
            .collect())
    }

    async fn vote_message(&self, chat_id: Uuid, message_id: Uuid, is_upvoted: bool) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .votes
            .insert((chat_id, message_id), is_upvoted);
        Ok(())
    }
}
