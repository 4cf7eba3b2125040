//! API error taxonomy.
//!
//! Every failure leaving a handler is a [`ChatError`]: an [`ErrorType`] paired
//! with the [`Surface`] it happened on. The wire shape is
//! `{ "code": "<type>:<surface>", "message": "...", "cause": "..." }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimit,
    Offline,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::BadRequest => "bad_request",
            ErrorType::Unauthorized => "unauthorized",
            ErrorType::Forbidden => "forbidden",
            ErrorType::NotFound => "not_found",
            ErrorType::RateLimit => "rate_limit",
            ErrorType::Offline => "offline",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorType::Forbidden => StatusCode::FORBIDDEN,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorType::Offline => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Api,
    Auth,
    Chat,
    Database,
    History,
    Stream,
    Vote,
}

impl Surface {
    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Api => "api",
            Surface::Auth => "auth",
            Surface::Chat => "chat",
            Surface::Database => "database",
            Surface::History => "history",
            Surface::Stream => "stream",
            Surface::Vote => "vote",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{}:{} {}", .kind.as_str(), .surface.as_str(), .message)]
pub struct ChatError {
    pub kind: ErrorType,
    pub surface: Surface,
    pub message: String,
    pub cause: Option<String>,
}

impl ChatError {
    pub fn new(kind: ErrorType, surface: Surface) -> Self {
        Self {
            kind,
            surface,
            message: default_message(kind, surface).to_string(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn bad_request() -> Self {
        Self::new(ErrorType::BadRequest, Surface::Api)
    }

    pub fn unauthorized(surface: Surface) -> Self {
        Self::new(ErrorType::Unauthorized, surface)
    }

    pub fn forbidden(surface: Surface) -> Self {
        Self::new(ErrorType::Forbidden, surface)
    }

    pub fn not_found(surface: Surface) -> Self {
        Self::new(ErrorType::NotFound, surface)
    }

    pub fn offline(surface: Surface) -> Self {
        Self::new(ErrorType::Offline, surface)
    }

    /// Storage failures are logged with their detail and surfaced without it.
    pub fn database(err: impl std::fmt::Display) -> Self {
        tracing::error!("database error: {}", err);
        Self::new(ErrorType::BadRequest, Surface::Database)
    }

    pub fn code(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.surface.as_str())
    }
}

fn default_message(kind: ErrorType, surface: Surface) -> &'static str {
    match (kind, surface) {
        (_, Surface::Database) => "An error occurred while executing a database query.",
        (ErrorType::BadRequest, Surface::Api) => {
            "The request couldn't be processed. Please check your input and try again."
        }
        (ErrorType::Unauthorized, Surface::Auth) => "You need to sign in before continuing.",
        (ErrorType::Forbidden, Surface::Auth) => {
            "Your account does not have access to this feature."
        }
        (ErrorType::RateLimit, Surface::Chat) => {
            "You have exceeded your maximum number of messages for the day. Please try again later."
        }
        (ErrorType::NotFound, Surface::Chat) => {
            "The requested chat was not found. Please check the chat ID and try again."
        }
        (ErrorType::Forbidden, Surface::Chat) => {
            "This chat belongs to another user. Please check the chat ID and try again."
        }
        (ErrorType::Unauthorized, Surface::Chat) => {
            "You need to sign in to view this chat. Please sign in and try again."
        }
        (ErrorType::Offline, Surface::Chat) => {
            "We're having trouble sending your message. Please check your internet connection and try again."
        }
        (ErrorType::NotFound, Surface::Stream) => "The requested stream was not found.",
        (ErrorType::NotFound, Surface::Vote) => {
            "The requested vote target was not found. Please check the chat ID and try again."
        }
        (ErrorType::Forbidden, Surface::Vote) => {
            "This chat belongs to another user. Voting is not allowed."
        }
        (ErrorType::Unauthorized, Surface::Vote) => {
            "You need to sign in to vote. Please sign in and try again."
        }
        (ErrorType::Unauthorized, Surface::History) => {
            "You need to sign in to view your chat history."
        }
        _ => "Something went wrong. Please try again later.",
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = self.kind.status();

        // Database details never reach the client.
        if self.surface == Surface::Database {
            return (
                status,
                Json(json!({ "code": "", "message": "Something went wrong. Please try again later." })),
            )
                .into_response();
        }

        let mut body = json!({ "code": code, "message": self.message });
        if let Some(cause) = self.cause {
            body["cause"] = json!(cause);
        }
        (status, Json(body)).into_response()
    }
}
