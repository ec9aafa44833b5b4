//! A live, two-party conversation within one case.
//!
//! `ConversationSession` ties the pieces together: it owns the message store,
//! the typing tracker and the connection state machine, drives the socket and
//! its timers, and exposes the caller-facing operations (`send`,
//! `mark_as_read`, `load_more`, `set_typing_indicator`, `refetch`).
//!
//! All state sits behind one mutex that is never held across an await, so
//! every inbound event is applied completely before the next one is looked at.
//! Background work (socket pump, reconnect and typing timers, the initial
//! fetch) runs in tasks that hold only a weak reference to the session;
//! `unmount` or dropping the last handle aborts all of them.
//!
//! Renderers call [`ConversationSession::view`] for a consistent snapshot and
//! [`ConversationSession::subscribe`] to learn when to call it again.

mod dispatch;
mod history;
mod send;

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use casesync_shared::Message;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api_client::MessagingApi;
use crate::config::SyncConfig;
use crate::stores::{MessageStore, TypingTracker};
use crate::ws::{ConnectionManager, ConnectionState, Transport, WsHandle};

pub use send::PendingSend;

/// Builds the socket URL from a freshly issued token.
pub type UrlBuilder = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Who is talking to whom, about which case.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationParams {
    pub case_id: String,
    pub current_user_id: String,
    pub current_user_name: String,
    pub current_user_role: String,
    pub other_user_id: String,
}

/// Snapshot of everything a renderer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationView {
    /// Sorted by `created_at` ascending.
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub is_loading_more: bool,
    pub is_connected: bool,
    pub connection_state: ConnectionState,
    pub ws_error: Option<String>,
    /// Failure of the last history fetch.
    pub error: Option<String>,
    /// Whether the other party is typing.
    pub is_typing: bool,
    pub has_more: bool,
    pub pending_sends: usize,
}

struct SessionState {
    store: MessageStore,
    connection: ConnectionManager,
    typing: TypingTracker,
    is_loading: bool,
    loading_more: bool,
    error: Option<String>,
    has_more: bool,
    /// In-flight optimistic sends keyed by correlation token.
    pending: HashMap<Uuid, String>,
    read_failures: u32,
    unmounted: bool,

    history_task: Option<JoinHandle<()>>,
    connect_task: Option<JoinHandle<()>>,
    socket_pump: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    typing_timer: Option<JoinHandle<()>>,
}

impl SessionState {
    /// Abort every background task and stop the connection. Returns the
    /// socket handle, if one was attached, for the caller to close.
    fn shutdown(&mut self) -> Option<WsHandle> {
        self.unmounted = true;
        for task in [
            self.history_task.take(),
            self.connect_task.take(),
            self.socket_pump.take(),
            self.reconnect_timer.take(),
            self.typing_timer.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
        self.typing.reset();
        self.connection.teardown()
    }
}

struct SessionInner {
    params: ConversationParams,
    config: SyncConfig,
    api: Arc<dyn MessagingApi>,
    transport: Arc<dyn Transport>,
    url_builder: UrlBuilder,
    state: Mutex<SessionState>,
    changes: watch::Sender<u64>,
    placeholder_seq: AtomicU64,
}

impl SessionInner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tell subscribers the view changed.
    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    fn view(&self) -> ConversationView {
        let st = self.lock();
        ConversationView {
            messages: st.store.sorted(),
            is_loading: st.is_loading,
            is_loading_more: st.loading_more,
            is_connected: st.connection.is_open(),
            connection_state: st.connection.state(),
            ws_error: st.connection.ws_error().map(str::to_string),
            error: st.error.clone(),
            is_typing: st.typing.is_typing(),
            has_more: st.has_more,
            pending_sends: st.pending.len(),
        }
    }

    /// Stamp `is_mine` and drop messages from other cases.
    fn adopt(&self, messages: Vec<Message>) -> Vec<Message> {
        messages
            .into_iter()
            .filter(|m| m.case_id == self.params.case_id)
            .map(|m| m.with_viewer(&self.params.current_user_id))
            .collect()
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let st = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = st.shutdown() {
            handle.close();
        }
    }
}

/// Handle to one conversation. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct ConversationSession {
    inner: Arc<SessionInner>,
}

impl ConversationSession {
    /// Create a session. Nothing happens on the network until [`mount`](Self::mount)
    /// (or an explicit `refetch`/`connect`).
    pub fn new(
        params: ConversationParams,
        api: Arc<dyn MessagingApi>,
        transport: Arc<dyn Transport>,
        url_builder: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
        config: SyncConfig,
    ) -> Self {
        let connection = ConnectionManager::new(
            config.reconnect.clone(),
            config.connection_error_message.clone(),
        );
        let typing = TypingTracker::new(params.case_id.clone(), params.current_user_id.clone());
        let (changes, _) = watch::channel(0u64);

        let state = SessionState {
            store: MessageStore::new(),
            connection,
            typing,
            is_loading: false,
            loading_more: false,
            error: None,
            has_more: false,
            pending: HashMap::new(),
            read_failures: 0,
            unmounted: false,
            history_task: None,
            connect_task: None,
            socket_pump: None,
            reconnect_timer: None,
            typing_timer: None,
        };

        Self {
            inner: Arc::new(SessionInner {
                params,
                config,
                api,
                transport,
                url_builder: Arc::new(url_builder),
                state: Mutex::new(state),
                changes,
                placeholder_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Start the initial history fetch and the first connection attempt in
    /// the background. Must be called from within a tokio runtime.
    pub fn mount(&self) {
        let weak = Arc::downgrade(&self.inner);
        let history = tokio::spawn(async move {
            if let Some(inner) = weak.upgrade() {
                let _ = inner.refetch().await;
            }
        });

        let weak = Arc::downgrade(&self.inner);
        let connect = tokio::spawn(async move {
            if let Some(inner) = weak.upgrade() {
                inner.connect(false).await;
            }
        });

        let mut st = self.inner.lock();
        if st.unmounted {
            history.abort();
            connect.abort();
            return;
        }
        for old in [
            st.history_task.replace(history),
            st.connect_task.replace(connect),
        ]
        .into_iter()
        .flatten()
        {
            old.abort();
        }
    }

    /// Close the socket and cancel every timer and background task. After
    /// this no handler runs and `send` rejects. Idempotent.
    pub fn unmount(&self) {
        let handle = {
            let mut st = self.inner.lock();
            if st.unmounted {
                return;
            }
            st.shutdown()
        };
        if let Some(handle) = handle {
            handle.close();
        }
        crate::log_info!("Conversation for case {} unmounted", self.inner.params.case_id);
        self.inner.notify();
    }

    pub fn is_mounted(&self) -> bool {
        !self.inner.lock().unmounted
    }

    pub fn params(&self) -> &ConversationParams {
        &self.inner.params
    }

    /// Consistent snapshot of the conversation.
    pub fn view(&self) -> ConversationView {
        self.inner.view()
    }

    /// Receiver that changes whenever the view may have changed.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    /// Messages sorted by `created_at`.
    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().store.sorted()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().is_loading
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connection.is_open()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.lock().connection.state()
    }

    pub fn ws_error(&self) -> Option<String> {
        self.inner.lock().connection.ws_error().map(str::to_string)
    }

    pub fn error(&self) -> Option<String> {
        self.inner.lock().error.clone()
    }

    pub fn is_typing(&self) -> bool {
        self.inner.lock().typing.is_typing()
    }

    pub fn has_more(&self) -> bool {
        self.inner.lock().has_more
    }
}
