//! Engine and client configuration.
//!
//! Defaults match the production behaviour; every knob can be overridden from
//! the environment.

use std::str::FromStr;
use std::time::Duration;

use crate::ws::ReconnectConfig;

/// User-facing text shown while the realtime socket is failing.
pub const DEFAULT_CONNECTION_ERROR: &str = "Real-time connection lost. Reconnecting...";

/// Tuning for a single conversation session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub reconnect: ReconnectConfig,
    /// How long a remote "typing" signal stays visible without a refresh.
    pub typing_expiry: Duration,
    /// Page size requested from the history endpoint.
    pub page_size: u32,
    pub connection_error_message: String,
    /// Consecutive mark-read failures between error-level log lines.
    pub read_failure_alert_threshold: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            typing_expiry: Duration::from_millis(3000),
            page_size: 50,
            connection_error_message: DEFAULT_CONNECTION_ERROR.to_string(),
            read_failure_alert_threshold: 3,
        }
    }
}

impl SyncConfig {
    /// Defaults with environment overrides applied.
    ///
    /// Environment variables:
    /// - `CASESYNC_RECONNECT_DELAY_MS`: initial reconnect delay (default: 3000)
    /// - `CASESYNC_RECONNECT_MULTIPLIER`: backoff growth factor (default: 1.0, fixed delay)
    /// - `CASESYNC_RECONNECT_MAX_ATTEMPTS`: 0 for unlimited (default: 0)
    /// - `CASESYNC_TYPING_EXPIRY_MS`: typing indicator lifetime (default: 3000)
    /// - `CASESYNC_PAGE_SIZE`: history page size (default: 50)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_parse::<u32>("CASESYNC_RECONNECT_DELAY_MS") {
            config.reconnect.initial_delay_ms = ms;
        }
        if let Some(multiplier) = env_parse::<f32>("CASESYNC_RECONNECT_MULTIPLIER") {
            config.reconnect.backoff_multiplier = multiplier.max(1.0);
        }
        if let Some(max) = env_parse::<u32>("CASESYNC_RECONNECT_MAX_ATTEMPTS") {
            config.reconnect.max_attempts = max;
        }
        if let Some(ms) = env_parse::<u64>("CASESYNC_TYPING_EXPIRY_MS") {
            config.typing_expiry = Duration::from_millis(ms);
        }
        if let Some(size) = env_parse::<u32>("CASESYNC_PAGE_SIZE") {
            config.page_size = size.max(1);
        }
        config
    }
}

/// Endpoints and identity for the terminal client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub ws_url: String,
    pub token: Option<String>,
    pub case_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_role: String,
    pub other_user_id: String,
}

impl ClientConfig {
    /// Environment variables:
    /// - `CASESYNC_API_URL` (default: "http://localhost:8080")
    /// - `CASESYNC_WS_URL` (default: "ws://localhost:8080/api/ws")
    /// - `CASESYNC_TOKEN`: bearer token for the API
    /// - `CASESYNC_CASE_ID`, `CASESYNC_USER_ID`, `CASESYNC_OTHER_USER_ID`
    /// - `CASESYNC_USER_NAME` (default: user id), `CASESYNC_USER_ROLE` (default: "client")
    pub fn from_env() -> Self {
        let user_id = env_string("CASESYNC_USER_ID").unwrap_or_default();
        Self {
            api_url: env_string("CASESYNC_API_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            ws_url: env_string("CASESYNC_WS_URL")
                .unwrap_or_else(|| "ws://localhost:8080/api/ws".to_string()),
            token: env_string("CASESYNC_TOKEN"),
            case_id: env_string("CASESYNC_CASE_ID").unwrap_or_default(),
            user_name: env_string("CASESYNC_USER_NAME").unwrap_or_else(|| user_id.clone()),
            user_role: env_string("CASESYNC_USER_ROLE").unwrap_or_else(|| "client".to_string()),
            other_user_id: env_string("CASESYNC_OTHER_USER_ID").unwrap_or_default(),
            user_id,
        }
    }
}

/// Append the socket token to `base` as a `token` query parameter.
///
/// Returns `None` when `base` is not an absolute URL.
pub fn socket_url(base: &str, token: &str) -> Option<String> {
    let mut url = url::Url::parse(base).ok()?;
    url.query_pairs_mut().append_pair("token", token);
    Some(url.to_string())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.typing_expiry, Duration::from_millis(3000));
        assert_eq!(config.reconnect.initial_delay_ms, 3000);
        assert_eq!(config.reconnect.max_attempts, 0);
    }

    #[test]
    fn test_socket_url_encodes_token() {
        let url = socket_url("wss://cases.example.com/api/ws", "a b+c").unwrap();
        assert_eq!(url, "wss://cases.example.com/api/ws?token=a+b%2Bc");
    }

    #[test]
    fn test_socket_url_keeps_existing_query() {
        let url = socket_url("ws://localhost:8080/ws?v=2", "tok").unwrap();
        assert_eq!(url, "ws://localhost:8080/ws?v=2&token=tok");
    }

    #[test]
    fn test_socket_url_rejects_relative() {
        assert!(socket_url("/api/ws", "tok").is_none());
    }
}
