//! HTTP API client for the case messaging endpoints.

use async_trait::async_trait;
use casesync_shared::{
    try_error_detail, ApiError, HistoryPage, HistoryQuery, MarkReadRequest, SendMessageRequest,
    SendMessageResponse, SocketToken,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The HTTP operations a conversation session depends on.
///
/// `send_message` reports application failures as
/// [`SendMessageResponse::Rejected`]; only transport-level problems come back
/// as `Err`.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    async fn fetch_history(&self, case_id: &str, query: &HistoryQuery)
        -> Result<HistoryPage, ApiError>;

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResponse, ApiError>;

    async fn mark_read(&self, message_ids: &[String]) -> Result<(), ApiError>;

    async fn fetch_socket_token(&self) -> Result<SocketToken, ApiError>;
}

/// HTTP client for the messaging API, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
            token: None,
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the bearer token sent with every request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    fn authorize(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    /// Make a GET request
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let rb = self.authorize(self.client.get(self.url(path)));
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    /// POST a JSON body, returning the raw status and body text.
    async fn post_raw<TReq: Serialize>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<(u16, bool, String), ApiError> {
        let body_bytes =
            serde_json::to_vec(body).map_err(|e| ApiError::Deserialize(e.to_string()))?;

        let resp = self
            .authorize(self.client.post(self.url(path)))
            .body(body_bytes)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp.text().await.map_err(|e| ApiError::Network(e.to_string()))?;
        Ok((status, is_success, text))
    }

    /// Make a POST request with JSON body
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let (status, is_success, text) = self.post_raw(path, body).await?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        if text.is_empty() {
            serde_json::from_str("null").map_err(|e| ApiError::Deserialize(e.to_string()))
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
        }
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Path for the history endpoint of a case, including the query string.
pub(crate) fn history_path(case_id: &str, query: &HistoryQuery) -> String {
    let mut path = format!(
        "/api/cases/{}/messages?otherUserId={}",
        urlencoding::encode(case_id),
        urlencoding::encode(&query.other_user_id)
    );
    if let Some(before) = &query.before_id {
        path.push_str(&format!("&before={}", urlencoding::encode(before)));
    }
    if let Some(limit) = query.limit {
        path.push_str(&format!("&limit={limit}"));
    }
    path
}

#[async_trait]
impl MessagingApi for ApiClient {
    async fn fetch_history(
        &self,
        case_id: &str,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, ApiError> {
        self.get_json(&history_path(case_id, query)).await
    }

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResponse, ApiError> {
        let path = format!("/api/cases/{}/messages", urlencoding::encode(&request.case_id));
        let (status, is_success, text) = self.post_raw(&path, request).await?;

        if !is_success {
            // Client errors with a readable body are application rejections.
            if (400..500).contains(&status) {
                if let Some(error) = try_error_detail(&text) {
                    return Ok(SendMessageResponse::Rejected { error });
                }
            }
            return Err(ApiError::Http { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    async fn mark_read(&self, message_ids: &[String]) -> Result<(), ApiError> {
        let body = MarkReadRequest {
            message_ids: message_ids.to_vec(),
        };
        let _: serde_json::Value = self.post_json("/api/messages/read", &body).await?;
        Ok(())
    }

    async fn fetch_socket_token(&self) -> Result<SocketToken, ApiError> {
        self.get_json("/api/ws/token").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new().with_base_url("https://cases.example.com/");
        assert_eq!(
            client.url("/api/ws/token"),
            "https://cases.example.com/api/ws/token"
        );
        assert_eq!(ApiClient::new().url("api/x"), "/api/x");
        assert_eq!(
            client.url("http://other.example.com/x"),
            "http://other.example.com/x"
        );
    }

    #[test]
    fn test_history_path() {
        let query = HistoryQuery {
            other_user_id: "u 2".to_string(),
            before_id: Some("msg-10".to_string()),
            limit: Some(50),
        };
        assert_eq!(
            history_path("case/1", &query),
            "/api/cases/case%2F1/messages?otherUserId=u%202&before=msg-10&limit=50"
        );

        let query = HistoryQuery {
            other_user_id: "u2".to_string(),
            before_id: None,
            limit: None,
        };
        assert_eq!(history_path("c1", &query), "/api/cases/c1/messages?otherUserId=u2");
    }
}
