//! Errors surfaced by conversation operations.

use casesync_shared::ApiError;

/// Failure of a caller-initiated operation.
///
/// Transport problems on the realtime socket never show up here; they are
/// reported through `ConversationView::ws_error` instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("case id must not be empty")]
    EmptyCaseId,
    #[error("message content must not be empty")]
    EmptyContent,
    /// The server answered with an application-level error.
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("conversation has been closed")]
    Unmounted,
}

impl SyncError {
    /// Text suitable for showing to a user, preferring whatever the server said.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Rejected(msg) => msg.clone(),
            SyncError::Api(err) => err.server_message().unwrap_or_else(|| err.to_string()),
            other => other.to_string(),
        }
    }
}
