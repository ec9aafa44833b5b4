//! Shared data models for case conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved prefix for locally generated placeholder message ids.
pub const PLACEHOLDER_PREFIX: &str = "temp-";

/// Whether `id` belongs to a placeholder that the server has not confirmed yet.
pub fn is_placeholder_id(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

// --- Messaging ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub file_name: String,
    pub mime: String,
    pub url: String,
    #[serde(default)]
    pub size: u64,
}

/// A single message in a two-party case conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub case_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: String,
    pub recipient_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    /// Derived locally from the sender; never sent over the wire.
    #[serde(default, skip_serializing)]
    pub is_mine: bool,
}

impl Message {
    /// Recompute `is_mine` for the given viewer.
    pub fn with_viewer(mut self, current_user_id: &str) -> Self {
        self.is_mine = self.sender_id == current_user_id;
        self
    }

    pub fn is_placeholder(&self) -> bool {
        is_placeholder_id(&self.id)
    }
}

// --- History ---

/// Query parameters for a history page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub other_user_id: String,
    /// Exclusive upper bound: only messages older than this id are returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub has_more: bool,
}

// --- Sending ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub case_id: String,
    pub recipient_id: String,
    pub content: String,
}

/// Result body of a send: either the confirmed message or an application error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SendMessageResponse {
    Confirmed { data: Message },
    Rejected { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub message_ids: Vec<String>,
}

// --- Realtime ---

/// Short-lived credential used to authenticate a socket connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocketToken {
    pub token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}
