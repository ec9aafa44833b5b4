//! Shared error types for the messaging API.

use serde::Deserialize;

/// Error body shapes the API is known to return. Every field is optional so a
/// body matching any one of them parses.
#[derive(Debug, Clone, Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Attempt to pull a user-facing message out of a JSON error body.
/// Prefers `error`, then `message`, `detail`, and finally `title`.
pub fn try_error_detail(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    [parsed.error, parsed.message, parsed.detail, parsed.title]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
}

/// API error type for client-side use
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    /// Server-provided explanation, if the error carries one.
    pub fn server_message(&self) -> Option<String> {
        match self {
            ApiError::Http { body, .. } => try_error_detail(body),
            _ => None,
        }
    }

    /// Whether the failure happened below the application layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_error_detail_prefers_error_field() {
        let body = r#"{"error":"Case is closed","message":"ignored"}"#;
        assert_eq!(try_error_detail(body).as_deref(), Some("Case is closed"));
    }

    #[test]
    fn test_try_error_detail_skips_blank_fields() {
        let body = r#"{"error":"  ","detail":"Token expired"}"#;
        assert_eq!(try_error_detail(body).as_deref(), Some("Token expired"));
    }

    #[test]
    fn test_try_error_detail_non_json() {
        assert_eq!(try_error_detail("<html>502</html>"), None);
        assert_eq!(try_error_detail("{}"), None);
    }

    #[test]
    fn test_server_message_only_for_http() {
        let http = ApiError::Http {
            status: 403,
            body: r#"{"error":"Forbidden"}"#.to_string(),
        };
        assert_eq!(http.server_message().as_deref(), Some("Forbidden"));
        assert_eq!(ApiError::Network("reset".into()).server_message(), None);
        assert!(ApiError::Network("reset".into()).is_transport());
    }
}
