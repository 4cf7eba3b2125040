use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::business::BusinessFunction;

pub(crate) const MAX_TEXT_PART_LENGTH: usize = 2000;
pub(crate) const GUEST_EMAIL_PREFIX: &str = "guest-";

// ── DB row types ────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(sqlx::FromRow)]
pub struct ChatRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub visibility: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: String,
    pub parts: sqlx::types::Json<Vec<MessagePart>>,
    pub attachments: sqlx::types::Json<Vec<Value>>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub struct VoteRow {
    pub chat_id: Uuid,
    pub message_id: Uuid,
    pub is_upvoted: bool,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User { id: r.id, email: r.email }
    }
}

impl From<ChatRow> for Chat {
    fn from(r: ChatRow) -> Self {
        Chat {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            visibility: Visibility::parse(&r.visibility),
            created_at: r.created_at,
        }
    }
}

impl From<MessageRow> for DbMessage {
    fn from(r: MessageRow) -> Self {
        DbMessage {
            id: r.id,
            chat_id: r.chat_id,
            role: Role::parse(&r.role),
            parts: r.parts.0,
            attachments: r.attachments.0,
            created_at: r.created_at,
        }
    }
}

impl From<VoteRow> for Vote {
    fn from(r: VoteRow) -> Self {
        Vote {
            chat_id: r.chat_id,
            message_id: r.message_id,
            is_upvoted: r.is_upvoted,
        }
    }
}

// ── User ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
}

impl User {
    /// Guest identities carry a synthetic `guest-*` email.
    pub fn is_guest(&self) -> bool {
        self.email
            .as_deref()
            .is_some_and(|e| e.starts_with(GUEST_EMAIL_PREFIX))
    }
}

// ── Chat ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }

    /// Unknown stored values are treated as private.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "public" => Visibility::Public,
            _ => Visibility::Private,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

// ── Message ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        }
    }
}

/// One content part of a UI message. Only `text` parts are interpreted;
/// anything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
            extra: Map::new(),
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }
}

/// Concatenated text of all `text` parts.
pub fn text_from_parts(parts: &[MessagePart]) -> String {
    parts
        .iter()
        .filter(|p| p.is_text())
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DbMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: Role,
    pub parts: Vec<MessagePart>,
    #[schema(value_type = Vec<Object>)]
    pub attachments: Vec<Value>,
    pub created_at: DateTime<Utc>,
}

impl DbMessage {
    pub fn text(&self) -> String {
        text_from_parts(&self.parts)
    }
}

// ── Stream ids ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// ── Votes ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub chat_id: Uuid,
    pub message_id: Uuid,
    pub is_upvoted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub chat_id: Uuid,
    pub message_id: Uuid,
    #[serde(rename = "type")]
    pub vote: VoteType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteQuery {
    pub chat_id: Option<String>,
}

// ── Chat submission ─────────────────────────────────────────────────────

/// A chat message as the UI sees it: the latest user message on submit,
/// the assistant reply inside `data-appendMessage` chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UiMessage {
    pub id: Uuid,
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostRequestBody {
    pub id: Uuid,
    pub message: UiMessage,
    pub selected_visibility_type: Visibility,
    #[serde(default)]
    pub business_function: Option<BusinessFunction>,
}

impl PostRequestBody {
    /// Shape checks beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.message.role != Role::User {
            return Err("message role must be user");
        }
        if self.message.parts.is_empty() {
            return Err("message has no parts");
        }
        for part in self.message.parts.iter().filter(|p| p.is_text()) {
            let len = part.text.as_deref().map_or(0, |t| t.chars().count());
            if len == 0 || len > MAX_TEXT_PART_LENGTH {
                return Err("text part must be 1..=2000 characters");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteChatQuery {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VisibilityRequest {
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

// ── Health ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub app: String,
    pub uptime_seconds: u64,
    pub store: String,
    pub resumable_streams: bool,
}
