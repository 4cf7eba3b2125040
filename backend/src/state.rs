// Shared application state handed to every handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::n8n::WebhookGateway;
use crate::resumable::StreamContext;
use crate::store::ChatStore;

/// Central application state. Clone-friendly: everything shared sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub config: Arc<Config>,
    pub gateway: WebhookGateway,
    /// Built once; `Disabled` when resumable streams are switched off.
    pub streams: StreamContext,
    pub start_time: Instant,
    /// `true` once startup (migrations, store ping) has completed.
    pub ready: Arc<AtomicBool>,
    /// Optional auth secret from AUTH_SECRET env. None = no Bearer gate.
    pub auth_secret: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn ChatStore>, config: Config, http_client: reqwest::Client) -> Self {
        let auth_secret = config.auth_secret.clone();
        if auth_secret.is_some() {
            tracing::info!("AUTH_SECRET configured, bearer authentication enabled");
        } else {
            tracing::info!("AUTH_SECRET not set, bearer authentication disabled");
        }

        let gateway = WebhookGateway::new(http_client, &config);
        let streams = StreamContext::init(&config);

        tracing::info!(
            store = store.kind(),
            n8n = %config.n8n_base_url,
            timeout_secs = config.webhook_timeout.as_secs(),
            "AppState initialised"
        );

        Self {
            store,
            config: Arc::new(config),
            gateway,
            streams,
            start_time: Instant::now(),
            ready: Arc::new(AtomicBool::new(false)),
            auth_secret,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
        tracing::info!("Backend marked as READY");
    }
}
