// Postgres-backed store (sqlx). Schema lives in backend/migrations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{guest_email, ChatStore, StoreResult};
use crate::models::{Chat, ChatRow, DbMessage, MessageRow, User, UserRow, Visibility, Vote, VoteRow};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgStore {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, email FROM cr_users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn create_user(&self, email: Option<&str>) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO cr_users (email) VALUES ($1) RETURNING id, email",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn create_guest_user(&self) -> StoreResult<User> {
        self.create_user(Some(&guest_email())).await
    }

    async fn get_chat(&self, id: Uuid) -> StoreResult<Option<Chat>> {
        let row = sqlx::query_as::<_, ChatRow>(
            "SELECT id, user_id, title, visibility, created_at FROM cr_chats WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Chat::from))
    }

    async fn save_chat(&self, chat: &Chat) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO cr_chats (id, user_id, title, visibility, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(chat.id)
        .bind(chat.user_id)
        .bind(&chat.title)
        .bind(chat.visibility.as_str())
        .bind(chat.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_chat_owner(&self, chat_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE cr_chats SET user_id = $1 WHERE id = $2")
            .bind(user_id)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_chat_visibility(&self, chat_id: Uuid, visibility: Visibility) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE cr_chats SET visibility = $1 WHERE id = $2")
            .bind(visibility.as_str())
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_chat(&self, id: Uuid) -> StoreResult<Option<Chat>> {
        // Messages, votes and stream ids go with the chat (ON DELETE CASCADE).
        let row = sqlx::query_as::<_, ChatRow>(
            "DELETE FROM cr_chats WHERE id = $1 \
             RETURNING id, user_id, title, visibility, created_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Chat::from))
    }

    async fn chats_by_user(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<Chat>> {
        let rows = sqlx::query_as::<_, ChatRow>(
            "SELECT id, user_id, title, visibility, created_at FROM cr_chats \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Chat::from).collect())
    }

    async fn save_messages(&self, messages: &[DbMessage]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for msg in messages {
            sqlx::query(
                "INSERT INTO cr_messages (id, chat_id, role, parts, attachments, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(msg.id)
            .bind(msg.chat_id)
            .bind(msg.role.as_str())
            .bind(sqlx::types::Json(&msg.parts))
            .bind(sqlx::types::Json(&msg.attachments))
            .bind(msg.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn messages_by_chat(&self, chat_id: Uuid) -> StoreResult<Vec<DbMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, chat_id, role, parts, attachments, created_at FROM cr_messages \
             WHERE chat_id = $1 ORDER BY created_at ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DbMessage::from).collect())
    }

    async fn get_message(&self, id: Uuid) -> StoreResult<Option<DbMessage>> {
        let row = sqlx::query_as::<_, MessageRow>(
            "SELECT id, chat_id, role, parts, attachments, created_at FROM cr_messages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(DbMessage::from))
    }

    async fn delete_messages_after(&self, chat_id: Uuid, after: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM cr_messages WHERE chat_id = $1 AND created_at >= $2")
            .bind(chat_id)
            .bind(after)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn create_stream_id(&self, stream_id: Uuid, chat_id: Uuid) -> StoreResult<()> {
        sqlx::query("INSERT INTO cr_streams (id, chat_id) VALUES ($1, $2)")
            .bind(stream_id)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn stream_ids_by_chat(&self, chat_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM cr_streams WHERE chat_id = $1 ORDER BY created_at ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn votes_by_chat(&self, chat_id: Uuid) -> StoreResult<Vec<Vote>> {
        let rows = sqlx::query_as::<_, VoteRow>(
            "SELECT chat_id, message_id, is_upvoted FROM cr_votes WHERE chat_id = $1",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Vote::from).collect())
    }

    async fn vote_message(&self, chat_id: Uuid, message_id: Uuid, is_upvoted: bool) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO cr_votes (chat_id, message_id, is_upvoted) VALUES ($1, $2, $3) \
             ON CONFLICT (chat_id, message_id) DO UPDATE SET is_upvoted = EXCLUDED.is_upvoted",
        )
        .bind(chat_id)
        .bind(message_id)
        .bind(is_upvoted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
