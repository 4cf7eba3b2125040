use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;

use crate::business::BusinessFunction;
use crate::config::Config;

/// Every way the webhook call can fail. Callers collapse all of these into
/// the single "offline" API error; the variants exist for logging.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid webhook url: {0}")]
    InvalidUrl(String),
    #[error("webhook did not respond within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("webhook request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("webhook returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("webhook body is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("webhook reply has no usable response: {0}")]
    InvalidReply(String),
}

/// JSON body sent to the workflow. `functions` is serialized as `null` for
/// the default business function.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    pub message: String,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub functions: Option<Vec<BusinessFunction>>,
}

impl WebhookRequest {
    pub fn new(message: String, chat_id: Uuid, user_id: Uuid, business_function: BusinessFunction) -> Self {
        Self {
            message,
            session_id: chat_id,
            user_id,
            functions: (!business_function.is_default()).then(|| vec![business_function]),
        }
    }
}

/// What came back, classified by transport.
pub enum WebhookResponse {
    /// Byte stream of newline-delimited JSON (possibly SSE-framed).
    Streaming(reqwest::Response),
    /// Single JSON document, already parsed.
    Buffered(Value),
}

impl std::fmt::Debug for WebhookResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookResponse::Streaming(resp) => f
                .debug_tuple("Streaming")
                .field(&resp.headers().get("content-type"))
                .finish(),
            WebhookResponse::Buffered(v) => f.debug_tuple("Buffered").field(v).finish(),
        }
    }
}

fn is_stream_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("text/event-stream")
        || ct.contains("application/x-ndjson")
        || ct.contains("application/octet-stream")
}

#[derive(Clone)]
pub struct WebhookGateway {
    client: reqwest::Client,
    base_url: String,
    webhook_id: String,
    timeout: Duration,
    verbose: bool,
}

impl WebhookGateway {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.n8n_base_url.clone(),
            webhook_id: config.n8n_webhook_id.clone(),
            timeout: config.webhook_timeout,
            verbose: config.development,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `{base}/webhook/{webhook_id}/{business function}`, each segment percent-encoded.
    pub fn webhook_url(&self, business_function: BusinessFunction) -> Result<Url, GatewayError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| GatewayError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["webhook", self.webhook_id.as_str(), business_function.label()]);
        Ok(url)
    }

    /// Single attempt, no retry. The timeout covers connecting, response
    /// headers and, for buffered replies, reading the body.
    pub async fn dispatch(
        &self,
        business_function: BusinessFunction,
        body: &WebhookRequest,
    ) -> Result<WebhookResponse, GatewayError> {
        let url = self.webhook_url(business_function)?;
        let deadline = Instant::now() + self.timeout;

        tracing::info!(url = %url, "n8n: calling webhook");
        if self.verbose {
            tracing::debug!(
                "n8n: request body: {}",
                serde_json::to_string_pretty(body).unwrap_or_default()
            );
        }

        let send = self.client.post(url).json(body).send();
        let resp = tokio::time::timeout_at(deadline, send)
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout))??;

        let status = resp.status();
        tracing::info!("n8n: response status {}", status);

        if !status.is_success() {
            let body = tokio::time::timeout_at(deadline, resp.text())
                .await
                .ok()
                .and_then(|r| r.ok())
                .unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if is_stream_content_type(&content_type) {
            tracing::debug!("n8n: streaming reply ({})", content_type);
            return Ok(WebhookResponse::Streaming(resp));
        }

        let text = tokio::time::timeout_at(deadline, resp.text())
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout))??;
        if self.verbose {
            tracing::debug!("n8n: raw reply: {}", text);
        }
        Ok(WebhookResponse::Buffered(serde_json::from_str(&text)?))
    }
}
