//! Shared test fixtures: an in-memory transport and a scripted API.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use casesync_client::ws::SocketCommand;
use casesync_client::{
    ConversationParams, ConversationSession, MessagingApi, SocketEvent, SocketLink, SyncConfig,
    Transport, WsHandle,
};
use casesync_shared::{
    ApiError, HistoryPage, HistoryQuery, Message, SendMessageRequest, SendMessageResponse,
    SocketToken,
};
use chrono::{TimeZone, Utc};
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

pub const CASE_ID: &str = "case-1";
pub const ME: &str = "u-client";
pub const OTHER: &str = "u-lawyer";
pub const WS_BASE: &str = "ws://test.local/api/ws";

// --- Transport ---

pub struct MockSocket {
    pub url: String,
    events: UnboundedSender<SocketEvent>,
    commands: UnboundedReceiver<SocketCommand>,
}

/// Records every socket the session opens and lets tests drive them.
#[derive(Default)]
pub struct MockTransport {
    sockets: Mutex<Vec<MockSocket>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open_count(&self) -> usize {
        self.sockets.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.sockets.lock().unwrap().iter().map(|s| s.url.clone()).collect()
    }

    /// Push an event into socket `index`.
    pub fn emit(&self, index: usize, event: SocketEvent) {
        let sockets = self.sockets.lock().unwrap();
        let _ = sockets[index].events.unbounded_send(event);
    }

    /// Push an event into the most recently opened socket.
    pub fn emit_last(&self, event: SocketEvent) {
        let last = self.open_count() - 1;
        self.emit(last, event);
    }

    /// Drain the commands written to socket `index` so far.
    pub fn commands(&self, index: usize) -> Vec<SocketCommand> {
        let mut sockets = self.sockets.lock().unwrap();
        let mut out = Vec::new();
        while let Ok(Some(cmd)) = sockets[index].commands.try_next() {
            out.push(cmd);
        }
        out
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &str) -> SocketLink {
        let (cmd_tx, cmd_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        self.sockets.lock().unwrap().push(MockSocket {
            url: url.to_string(),
            events: event_tx,
            commands: cmd_rx,
        });
        SocketLink {
            handle: WsHandle::new(cmd_tx),
            events: event_rx,
        }
    }
}

// --- API ---

/// Scripted `MessagingApi`. Unscripted calls succeed with sensible defaults:
/// an empty history page, and a send confirmed as `msg-<n>`.
#[derive(Default)]
pub struct MockApi {
    history: Mutex<VecDeque<Result<HistoryPage, ApiError>>>,
    history_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub history_calls: Mutex<Vec<HistoryQuery>>,

    send_responses: Mutex<VecDeque<Result<SendMessageResponse, ApiError>>>,
    send_gates: Mutex<VecDeque<oneshot::Receiver<Result<SendMessageResponse, ApiError>>>>,
    pub sends: Mutex<Vec<SendMessageRequest>>,

    pub mark_read_calls: Mutex<Vec<Vec<String>>>,
    pub mark_read_fails: AtomicBool,

    pub token_calls: AtomicUsize,
    pub token_fails: AtomicBool,
    token_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_history(&self, page: Result<HistoryPage, ApiError>) {
        self.history.lock().unwrap().push_back(page);
    }

    /// Hold the next history response until the returned sender fires.
    pub fn gate_history(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.history_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn push_send(&self, response: Result<SendMessageResponse, ApiError>) {
        self.send_responses.lock().unwrap().push_back(response);
    }

    /// The next send waits for whatever the returned sender delivers.
    pub fn gate_send(&self) -> oneshot::Sender<Result<SendMessageResponse, ApiError>> {
        let (tx, rx) = oneshot::channel();
        self.send_gates.lock().unwrap().push_back(rx);
        tx
    }

    /// Hold the next token request until the returned sender fires. Dropping
    /// the sender releases it too; keep it alive to hold the request forever.
    pub fn gate_token(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.token_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    pub fn history_count(&self) -> usize {
        self.history_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MessagingApi for MockApi {
    async fn fetch_history(
        &self,
        _case_id: &str,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, ApiError> {
        self.history_calls.lock().unwrap().push(query.clone());
        let gate = self.history_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let scripted = self.history.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(HistoryPage {
            messages: Vec::new(),
            total: 0,
            has_more: false,
        }))
    }

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResponse, ApiError> {
        let n = {
            let mut sends = self.sends.lock().unwrap();
            sends.push(request.clone());
            sends.len()
        };
        let gate = self.send_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            return gate
                .await
                .unwrap_or_else(|_| Err(ApiError::Network("gate dropped".to_string())));
        }
        let scripted = self.send_responses.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(SendMessageResponse::Confirmed {
                data: confirmed(request, &format!("msg-{n}")),
            })
        })
    }

    async fn mark_read(&self, message_ids: &[String]) -> Result<(), ApiError> {
        self.mark_read_calls.lock().unwrap().push(message_ids.to_vec());
        if self.mark_read_fails.load(Ordering::SeqCst) {
            return Err(ApiError::Http {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_socket_token(&self) -> Result<SocketToken, ApiError> {
        let n = self.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let gate = self.token_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.token_fails.load(Ordering::SeqCst) {
            return Err(ApiError::Network("token service down".to_string()));
        }
        Ok(SocketToken {
            token: format!("tok-{n}"),
            expires_in: 60,
        })
    }
}

// --- Builders ---

pub fn params() -> ConversationParams {
    ConversationParams {
        case_id: CASE_ID.to_string(),
        current_user_id: ME.to_string(),
        current_user_name: "Carla Client".to_string(),
        current_user_role: "client".to_string(),
        other_user_id: OTHER.to_string(),
    }
}

pub fn session(api: &Arc<MockApi>, transport: &Arc<MockTransport>) -> ConversationSession {
    session_with(params(), api, transport)
}

pub fn session_with(
    params: ConversationParams,
    api: &Arc<MockApi>,
    transport: &Arc<MockTransport>,
) -> ConversationSession {
    ConversationSession::new(
        params,
        api.clone(),
        transport.clone(),
        |token| casesync_client::socket_url(WS_BASE, token),
        SyncConfig::default(),
    )
}

/// A message in `case_id` sent by `sender`, created at 10:`minute` on a fixed day.
pub fn message(id: &str, case_id: &str, sender: &str, minute: u32) -> Message {
    let recipient = if sender == ME { OTHER } else { ME };
    Message {
        id: id.to_string(),
        case_id: case_id.to_string(),
        sender_id: sender.to_string(),
        sender_name: format!("name of {sender}"),
        sender_role: "lawyer".to_string(),
        recipient_id: recipient.to_string(),
        content: format!("content of {id}"),
        attachments: Vec::new(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap(),
        read_at: None,
        is_mine: false,
    }
}

pub fn confirmed(request: &SendMessageRequest, id: &str) -> Message {
    Message {
        id: id.to_string(),
        case_id: request.case_id.clone(),
        sender_id: ME.to_string(),
        sender_name: "Carla Client".to_string(),
        sender_role: "client".to_string(),
        recipient_id: request.recipient_id.clone(),
        content: request.content.clone(),
        attachments: Vec::new(),
        created_at: Utc::now(),
        read_at: None,
        is_mine: false,
    }
}

pub fn page(messages: Vec<Message>, has_more: bool) -> HistoryPage {
    HistoryPage {
        total: messages.len() as u64,
        messages,
        has_more,
    }
}

// --- Frames ---

pub fn new_message_frame(msg: &Message) -> String {
    serde_json::json!({ "type": "new_message", "payload": msg }).to_string()
}

pub fn offline_frame(msgs: &[Message]) -> String {
    serde_json::json!({ "type": "offline_messages", "payload": { "messages": msgs } }).to_string()
}

pub fn receipt_frame(ids: &[&str], read_at: &str) -> String {
    serde_json::json!({
        "type": "read_receipt",
        "payload": { "messageIds": ids, "readAt": read_at }
    })
    .to_string()
}

pub fn typing_frame(case_id: &str, user_id: &str, is_typing: bool) -> String {
    serde_json::json!({
        "type": "typing",
        "payload": { "caseId": case_id, "userId": user_id, "isTyping": is_typing }
    })
    .to_string()
}

/// Let spawned tasks (socket pump, timers) run.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Connect the session and open its socket.
pub async fn open(session: &ConversationSession, transport: &MockTransport) {
    session.connect().await;
    transport.emit_last(SocketEvent::Open);
    settle().await;
}

pub fn ids(session: &ConversationSession) -> Vec<String> {
    session.messages().into_iter().map(|m| m.id).collect()
}
