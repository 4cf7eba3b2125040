// Runtime configuration, read once at startup from the environment (.env via dotenvy).

use std::time::Duration;

pub const DEFAULT_N8N_BASE_URL: &str = "https://n8n.srv838270.hstgr.cloud";
pub const DEFAULT_N8N_WEBHOOK_ID: &str = "0a7ad9c6-bec1-45ff-9c4a-0884f6725583";
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Config {
    pub n8n_base_url: String,
    pub n8n_webhook_id: String,
    /// Upper bound on the outbound webhook call; expiry counts as "offline".
    pub webhook_timeout: Duration,
    /// `APP_ENV=development`: gates verbose webhook exchange logging.
    pub development: bool,
    pub database_url: Option<String>,
    pub resumable_streams: bool,
    pub auth_secret: Option<String>,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            n8n_base_url: DEFAULT_N8N_BASE_URL.to_string(),
            n8n_webhook_id: DEFAULT_N8N_WEBHOOK_ID.to_string(),
            webhook_timeout: Duration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS),
            development: false,
            database_url: None,
            resumable_streams: true,
            auth_secret: None,
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let webhook_timeout = get("N8N_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.webhook_timeout);

        let resumable_streams = get("RESUMABLE_STREAMS")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "off" | "false" | "0" | "disabled"))
            .unwrap_or(defaults.resumable_streams);

        let port = match get("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("config: invalid PORT {:?}, using {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        Self {
            n8n_base_url: get("N8N_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.n8n_base_url),
            n8n_webhook_id: get("N8N_WEBHOOK_ID").unwrap_or(defaults.n8n_webhook_id),
            webhook_timeout,
            development: get("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("development")),
            database_url: get("DATABASE_URL"),
            resumable_streams,
            auth_secret: get("AUTH_SECRET"),
            port,
        }
    }
}
