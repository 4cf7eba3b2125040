//! Outbound n8n workflow webhook.
//!
//! - `gateway` : request construction, timeout, transport classification
//! - `reconcile` : reply normalization and incremental stream decoding

pub mod gateway;
pub mod reconcile;

pub use gateway::{GatewayError, WebhookGateway, WebhookRequest, WebhookResponse};
pub use reconcile::{normalize_reply, StreamAccumulator, WebhookReply};
