//! Realtime socket frames.
//!
//! Every frame is a JSON object `{ "type": ..., "payload": ... }`. Inbound
//! frames are parsed in two steps so that unknown types never fail the
//! connection: the envelope first, then the payload for types we understand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Message;

pub const FRAME_NEW_MESSAGE: &str = "new_message";
pub const FRAME_OFFLINE_MESSAGES: &str = "offline_messages";
pub const FRAME_READ_RECEIPT: &str = "read_receipt";
pub const FRAME_TYPING: &str = "typing";

#[derive(Debug, Clone, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfflineMessages {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub message_ids: Vec<String>,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
    pub case_id: String,
    pub user_id: String,
    pub is_typing: bool,
}

/// A frame received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    NewMessage(Message),
    OfflineMessages(OfflineMessages),
    ReadReceipt(ReadReceipt),
    Typing(TypingSignal),
    /// A frame type this client does not handle. Carries the type name.
    Unknown(String),
}

impl ServerFrame {
    /// Parse a text frame. Errors only on malformed JSON or a malformed
    /// payload of a known type.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawFrame = serde_json::from_str(text)?;
        let frame = match raw.kind.as_str() {
            FRAME_NEW_MESSAGE => ServerFrame::NewMessage(serde_json::from_value(raw.payload)?),
            FRAME_OFFLINE_MESSAGES => {
                ServerFrame::OfflineMessages(serde_json::from_value(raw.payload)?)
            }
            FRAME_READ_RECEIPT => ServerFrame::ReadReceipt(serde_json::from_value(raw.payload)?),
            FRAME_TYPING => ServerFrame::Typing(serde_json::from_value(raw.payload)?),
            _ => ServerFrame::Unknown(raw.kind),
        };
        Ok(frame)
    }

    /// The frame's wire type name.
    pub fn kind(&self) -> &str {
        match self {
            ServerFrame::NewMessage(_) => FRAME_NEW_MESSAGE,
            ServerFrame::OfflineMessages(_) => FRAME_OFFLINE_MESSAGES,
            ServerFrame::ReadReceipt(_) => FRAME_READ_RECEIPT,
            ServerFrame::Typing(_) => FRAME_TYPING,
            ServerFrame::Unknown(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    pub case_id: String,
    pub recipient_id: String,
    pub is_typing: bool,
}

/// A frame sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientFrame {
    Typing(TypingIndicator),
}

impl ClientFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read_receipt() {
        let frame = ServerFrame::parse(
            r#"{"type":"read_receipt","payload":{"messageIds":["a","b"],"readAt":"2024-03-01T10:05:00Z"}}"#,
        )
        .unwrap();
        match frame {
            ServerFrame::ReadReceipt(r) => assert_eq!(r.message_ids, vec!["a", "b"]),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_type_is_not_an_error() {
        let frame = ServerFrame::parse(r#"{"type":"case_stage_changed","payload":{"stage":3}}"#)
            .unwrap();
        assert_eq!(frame, ServerFrame::Unknown("case_stage_changed".to_string()));
        assert_eq!(frame.kind(), "case_stage_changed");
    }

    #[test]
    fn test_parse_unknown_type_without_payload() {
        let frame = ServerFrame::parse(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(frame, ServerFrame::Unknown("pong".to_string()));
    }

    #[test]
    fn test_parse_malformed_known_payload_fails() {
        assert!(ServerFrame::parse(r#"{"type":"typing","payload":{"caseId":1}}"#).is_err());
        assert!(ServerFrame::parse("not json").is_err());
    }

    #[test]
    fn test_typing_frame_wire_shape() {
        let frame = ClientFrame::Typing(TypingIndicator {
            case_id: "case-1".to_string(),
            recipient_id: "u-2".to_string(),
            is_typing: true,
        });
        let json: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "typing");
        assert_eq!(json["payload"]["caseId"], "case-1");
        assert_eq!(json["payload"]["recipientId"], "u-2");
        assert_eq!(json["payload"]["isTyping"], true);
    }
}
