//! UI message stream framing.
//!
//! The chat front end consumes a text/event-stream where every event is one
//! JSON chunk (`data: {...}\n\n`) and the stream ends with `data: [DONE]`.
//! Assistant text travels inside `data-appendMessage` chunks whose `data` is
//! the JSON-encoded message; those chunks are always transient, the stored
//! message row is the durable copy.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

pub const UI_MESSAGE_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const UI_MESSAGE_STREAM_VERSION: &str = "v1";
pub const APPEND_MESSAGE: &str = "data-appendMessage";

const DONE_MARKER: &str = "[DONE]";

/// One event on the UI message stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UiChunk {
    #[serde(rename = "data-appendMessage")]
    AppendMessage {
        /// JSON-encoded message (`{id, role, parts, ...}`).
        data: String,
        #[serde(default)]
        transient: bool,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "errorText")]
        error_text: String,
    },
}

impl UiChunk {
    pub fn append_message<T: Serialize>(message: &T) -> Result<Self, serde_json::Error> {
        Ok(UiChunk::AppendMessage {
            data: serde_json::to_string(message)?,
            transient: true,
        })
    }

    pub fn error(text: impl Into<String>) -> Self {
        UiChunk::Error {
            error_text: text.into(),
        }
    }

    /// `data: <json>\n\n`
    pub fn to_frame(&self) -> Bytes {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        Bytes::from(format!("data: {}\n\n", json))
    }
}

pub fn done_frame() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

/// Outcome of parsing one SSE `data:` payload on the receiving side.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Chunk(UiChunk),
    Done,
}

/// Parse a single SSE line. Comments, blank lines, non-`data` fields and
/// chunk types we do not model yield `None`.
pub fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload == DONE_MARKER {
        return Some(SseEvent::Done);
    }
    serde_json::from_str::<UiChunk>(payload).ok().map(SseEvent::Chunk)
}

/// Streaming SSE response with the UI message stream headers.
pub fn sse_response(body: Body) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
            (
                header::HeaderName::from_static(UI_MESSAGE_STREAM_HEADER),
                HeaderValue::from_static(UI_MESSAGE_STREAM_VERSION),
            ),
            (
                header::HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        body,
    )
        .into_response()
}

/// A complete stream made of the given chunks followed by `[DONE]`.
pub fn chunks_response(chunks: &[UiChunk]) -> Response {
    let mut buf = Vec::new();
    for chunk in chunks {
        buf.extend_from_slice(&chunk.to_frame());
    }
    buf.extend_from_slice(&done_frame());
    sse_response(Body::from(buf))
}

/// Stream carrying no chunks, only the terminator.
pub fn empty_response() -> Response {
    chunks_response(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessagePart, Role, UiMessage};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn append_message_frame_shape() {
        let msg = UiMessage {
            id: Uuid::nil(),
            role: Role::Assistant,
            parts: vec![MessagePart::text("hi")],
        };
        let frame = UiChunk::append_message(&msg).unwrap().to_frame();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: "));
        assert!(text.ends_with("\n\n"));

        let value: serde_json::Value = serde_json::from_str(text[6..].trim()).unwrap();
        assert_eq!(value["type"], APPEND_MESSAGE);
        assert_eq!(value["transient"], true);
        let inner: serde_json::Value =
            serde_json::from_str(value["data"].as_str().unwrap()).unwrap();
        assert_eq!(inner["role"], "assistant");
        assert_eq!(inner["parts"], json!([{ "type": "text", "text": "hi" }]));
    }

    #[test]
    fn error_chunk_uses_error_text() {
        let value = serde_json::to_value(UiChunk::error("boom")).unwrap();
        assert_eq!(value, json!({ "type": "error", "errorText": "boom" }));
    }

    #[test]
    fn parse_lines() {
        assert_eq!(parse_sse_line("data: [DONE]"), Some(SseEvent::Done));
        assert_eq!(parse_sse_line(": heartbeat"), None);
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line(r#"data: {"type":"text-delta","delta":"x"}"#), None);
        assert_eq!(
            parse_sse_line(r#"data: {"type":"data-appendMessage","data":"{}","transient":true}"#),
            Some(SseEvent::Chunk(UiChunk::AppendMessage {
                data: "{}".into(),
                transient: true
            }))
        );
    }

    #[test]
    fn sse_headers() {
        let resp = empty_response();
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(resp.headers()[UI_MESSAGE_STREAM_HEADER], "v1");
    }
}
