//! Turning whatever the workflow sent back into assistant text.
//!
//! Buffered replies arrive in one of three historical shapes, all carrying
//! `{ success, response, sessionId?, userId? }`:
//!
//! ```text
//! [ { "success": true, "response": "..." } ]
//! { "json": { "success": true, "response": "..." } }
//! { "success": true, "response": "..." }
//! ```
//!
//! Streaming replies are newline-delimited JSON, optionally SSE-framed, and
//! are decoded incrementally by [`StreamAccumulator`].

use serde_json::Value;
use uuid::Uuid;

use super::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookReply {
    pub response: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

impl WebhookReply {
    /// The workflow may echo ids back. Ours stay authoritative; a mismatch
    /// is only worth a warning.
    pub fn warn_on_id_mismatch(&self, chat_id: Uuid, user_id: Uuid) {
        if let Some(sid) = self.session_id.as_deref() {
            if sid != chat_id.to_string() {
                tracing::warn!(expected = %chat_id, got = sid, "n8n: reply carries a different sessionId");
            }
        }
        if let Some(uid) = self.user_id.as_deref() {
            if uid != user_id.to_string() {
                tracing::warn!(expected = %user_id, got = uid, "n8n: reply carries a different userId");
            }
        }
    }
}

/// JavaScript-style truthiness, which is what the workflow authors rely on.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Unwrap the array / `json` wrappers and validate the record.
pub fn normalize_reply(payload: Value) -> Result<WebhookReply, GatewayError> {
    let record = match payload {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        Value::Object(mut map) if map.get("json").is_some_and(is_truthy) => {
            map.remove("json").unwrap_or(Value::Null)
        }
        other => other,
    };

    let success = record.get("success").is_some_and(is_truthy);
    let response = non_empty_str(record.get("response"));

    match (success, response) {
        (true, Some(response)) => Ok(WebhookReply {
            response,
            session_id: non_empty_str(record.get("sessionId")),
            user_id: non_empty_str(record.get("userId")),
        }),
        _ => {
            tracing::error!("n8n: invalid reply structure: {}", record);
            Err(GatewayError::InvalidReply(
                "missing truthy `success` or non-empty `response`".to_string(),
            ))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Streaming decode
// ═══════════════════════════════════════════════════════════════════════

/// Upper bound for any one decode buffer; matches the API request body limit.
pub const MAX_DECODE_BYTES: usize = 1024 * 1024;

/// Incremental decoder for the streaming reply.
///
/// Three line kinds are understood:
/// - `{"type":"item","content":"..."}`: `content` fragments concatenate into
///   either a JSON document `{"response":"..."}` or plain text
/// - legacy flat objects carrying `response`, `text` or `delta`
/// - anything else, kept as raw text
///
/// [`push_chunk`](Self::push_chunk) returns the current best text only when
/// it differs from the last value returned.
///
/// No buffer grows past [`MAX_DECODE_BYTES`]. An upstream that overruns it
/// (no newline, an item document that never closes) stops being decoded;
/// the text decoded up to that point is kept.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    pending: Vec<u8>,
    overflowed: bool,
    item_buffer: String,
    item_text: Option<String>,
    legacy_text: String,
    raw_text: String,
    last_emitted: Option<String>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; complete lines are decoded, a trailing partial line is kept.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Option<String> {
        if self.overflowed {
            return None;
        }
        self.pending.extend_from_slice(chunk);
        while let Some(nl) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=nl).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.ingest_line(&line);
        }
        if self.pending.len() > MAX_DECODE_BYTES {
            self.overflow("unterminated line");
        }
        self.take_update()
    }

    /// Feed one already-split line.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        if self.overflowed {
            return None;
        }
        self.ingest_line(line);
        self.take_update()
    }

    /// Flush any unterminated line and return the final text, if any.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.ingest_line(&line);
        }
        self.best().map(str::to_string)
    }

    /// Decoding stopped because a buffer hit [`MAX_DECODE_BYTES`].
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    fn overflow(&mut self, what: &str) {
        tracing::warn!("n8n: {} exceeds {} bytes, decoding stopped", what, MAX_DECODE_BYTES);
        self.overflowed = true;
        self.pending = Vec::new();
        self.item_buffer = String::new();
    }

    /// Highest-fidelity text decoded so far.
    pub fn best(&self) -> Option<&str> {
        self.item_text
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| Some(self.legacy_text.as_str()).filter(|s| !s.is_empty()))
            .or_else(|| Some(self.raw_text.as_str()).filter(|s| !s.is_empty()))
    }

    fn take_update(&mut self) -> Option<String> {
        let current = self.best()?;
        if self.last_emitted.as_deref() == Some(current) {
            return None;
        }
        let current = current.to_string();
        self.last_emitted = Some(current.clone());
        Some(current)
    }

    fn ingest_line(&mut self, line: &str) {
        let mut line = line.trim();
        if let Some(data) = line.strip_prefix("data:") {
            line = data.trim();
        }
        if self.overflowed || line.is_empty() || line == "[DONE]" || line.starts_with(':') {
            return;
        }

        let Ok(value) = serde_json::from_str::<Value>(line) else {
            if self.raw_text.len() + line.len() + 1 > MAX_DECODE_BYTES {
                return self.overflow("raw text");
            }
            if !self.raw_text.is_empty() {
                self.raw_text.push('\n');
            }
            self.raw_text.push_str(line);
            return;
        };

        let Value::Object(obj) = value else {
            if let Value::String(s) = value {
                if self.legacy_text.len() + s.len() > MAX_DECODE_BYTES {
                    return self.overflow("legacy text");
                }
                self.legacy_text.push_str(&s);
            }
            return;
        };

        match obj.get("type").and_then(Value::as_str) {
            Some("item") => {
                if let Some(content) = obj.get("content").and_then(Value::as_str) {
                    if self.item_buffer.len() + content.len() > MAX_DECODE_BYTES {
                        return self.overflow("item document");
                    }
                    self.item_buffer.push_str(content);
                    self.reparse_items();
                }
            }
            Some("error") => {
                let report = serde_json::Value::Object(obj);
                tracing::warn!("n8n: stream reported error: {}", report);
            }
            Some("begin") | Some("end") => {}
            _ => {
                let delta = ["response", "text", "delta"]
                    .iter()
                    .find_map(|k| obj.get(*k).and_then(Value::as_str));
                if let Some(delta) = delta {
                    if self.legacy_text.len() + delta.len() > MAX_DECODE_BYTES {
                        return self.overflow("legacy text");
                    }
                    self.legacy_text.push_str(delta);
                }
            }
        }
    }

    /// Re-derive the item text from everything accumulated so far. A JSON
    /// document only counts once it parses completely.
    fn reparse_items(&mut self) {
        let buffer = self.item_buffer.trim_start();
        if !buffer.starts_with('{') {
            // Plain token stream.
            self.item_text = Some(self.item_buffer.clone());
            return;
        }

        if let Ok(doc) = serde_json::from_str::<Value>(buffer) {
            if let Some(response) = doc.get("response").and_then(Value::as_str) {
                self.item_text = Some(response.to_string());
            }
        }
    }
}
