//! Socket lifecycle and inbound event dispatch.

use std::sync::{Arc, Weak};
use std::time::Duration;

use casesync_shared::{ServerFrame, TypingSignal};
use futures_channel::mpsc::UnboundedReceiver;
use futures_util::StreamExt;

use super::{ConversationSession, SessionInner, SessionState};
use crate::stores::{TypingTicket, TypingUpdate};
use crate::ws::{CloseOutcome, SocketEvent};

impl ConversationSession {
    /// Start a connection attempt now. No-op if a socket is already pending
    /// or open, or the session is unmounted. An attempt still waiting for its
    /// token is superseded by this one.
    ///
    /// Dropping the returned future before the socket is attached counts as a
    /// failed attempt, so a reconnect is scheduled as usual.
    pub async fn connect(&self) {
        self.inner.connect(false).await;
    }

    /// Apply one raw inbound text frame, exactly as the transport would.
    pub fn handle_inbound_frame(&self, text: &str) {
        self.inner.handle_inbound_frame(text);
    }

    /// Apply an already parsed inbound frame.
    pub fn apply_frame(&self, frame: ServerFrame) {
        self.inner.apply_frame(frame);
    }
}

/// Closes out an attempt whose future is dropped before its socket is
/// attached. Without it the manager would keep the attempt in flight forever.
struct AttemptGuard<'a> {
    inner: &'a Arc<SessionInner>,
    generation: u64,
    armed: bool,
}

impl AttemptGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        crate::log_debug!("Connection attempt #{} dropped before opening", self.generation);
        if tokio::runtime::Handle::try_current().is_ok() {
            self.inner.handle_socket_event(self.generation, SocketEvent::Closed);
        } else {
            // No runtime to arm a timer on; just release the attempt.
            self.inner.lock().connection.abandon(self.generation);
        }
    }
}

/// Forward socket events for one connection generation into the session.
async fn pump(
    session: Weak<SessionInner>,
    generation: u64,
    mut events: UnboundedReceiver<SocketEvent>,
) {
    while let Some(event) = events.next().await {
        let Some(inner) = session.upgrade() else {
            break;
        };
        inner.handle_socket_event(generation, event);
    }
}

impl SessionInner {
    /// One connection attempt: token, URL, open. `from_timer` is set when
    /// called by the reconnect timer itself, whose handle must not be aborted.
    pub(super) async fn connect(self: &Arc<Self>, from_timer: bool) {
        let generation = {
            let mut st = self.lock();
            if st.unmounted {
                return;
            }
            let timer = st.reconnect_timer.take();
            if !from_timer {
                if let Some(timer) = timer {
                    timer.abort();
                }
            }
            match st.connection.begin_attempt() {
                Some(generation) => generation,
                None => {
                    crate::log_debug!("Connect skipped: socket already pending or open");
                    return;
                }
            }
        };
        let mut guard = AttemptGuard {
            inner: self,
            generation,
            armed: true,
        };
        self.notify();
        crate::log_info!(
            "Connecting realtime socket for case {} (attempt #{})",
            self.params.case_id,
            generation
        );

        let url = match self.api.fetch_socket_token().await {
            Ok(token) => {
                let url = (self.url_builder)(&token.token);
                if url.is_none() {
                    crate::log_error!("Could not build socket URL from token");
                }
                url
            }
            Err(e) => {
                crate::log_warn!("Failed to fetch socket token: {}", e);
                None
            }
        };
        guard.disarm();

        let Some(url) = url else {
            // No socket to report on; treat it like an error followed by a close.
            self.handle_socket_event(generation, SocketEvent::Error("no socket url".to_string()));
            self.handle_socket_event(generation, SocketEvent::Closed);
            return;
        };

        let mut st = self.lock();
        if !st.connection.is_current(generation) {
            return;
        }
        let link = self.transport.open(&url);
        if let Err(handle) = st.connection.attach(generation, link.handle) {
            handle.close();
            return;
        }
        if let Some(old) = st.socket_pump.take() {
            old.abort();
        }
        st.socket_pump = Some(tokio::spawn(pump(
            Arc::downgrade(self),
            generation,
            link.events,
        )));
    }

    pub(super) fn handle_socket_event(self: &Arc<Self>, generation: u64, event: SocketEvent) {
        match event {
            SocketEvent::Message(text) => {
                if self.lock().connection.is_current(generation) {
                    self.handle_inbound_frame(&text);
                }
            }
            SocketEvent::Open => {
                if self.lock().connection.on_open(generation) {
                    crate::log_info!("Realtime socket open for case {}", self.params.case_id);
                    self.notify();
                }
            }
            SocketEvent::Error(reason) => {
                let changed = self.lock().connection.on_error(generation);
                if changed {
                    crate::log_warn!("Realtime socket error: {}", reason);
                    self.notify();
                }
            }
            SocketEvent::Closed => {
                let mut st = self.lock();
                match st.connection.on_close(generation) {
                    CloseOutcome::Ignored => return,
                    CloseOutcome::AlreadyScheduled => {
                        crate::log_debug!("Socket closed again; reconnect already scheduled");
                    }
                    CloseOutcome::Schedule(delay) => {
                        crate::log_info!("Socket closed; reconnecting in {}ms", delay.as_millis());
                        self.schedule_reconnect(&mut st, delay);
                    }
                    CloseOutcome::GaveUp => {
                        crate::log_error!(
                            "Giving up on realtime socket for case {} after {} attempts",
                            self.params.case_id,
                            self.config.reconnect.max_attempts
                        );
                    }
                }
                drop(st);
                self.notify();
            }
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, st: &mut SessionState, delay: Duration) {
        if let Some(timer) = st.reconnect_timer.take() {
            timer.abort();
        }
        let weak = Arc::downgrade(self);
        st.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.connect(true).await;
            }
        }));
    }

    pub(super) fn handle_inbound_frame(self: &Arc<Self>, text: &str) {
        match ServerFrame::parse(text) {
            Ok(frame) => self.apply_frame(frame),
            Err(e) => crate::log_warn!("Ignoring malformed frame: {}", e),
        }
    }

    pub(super) fn apply_frame(self: &Arc<Self>, frame: ServerFrame) {
        let changed = {
            let mut st = self.lock();
            if st.unmounted {
                return;
            }
            match frame {
                ServerFrame::NewMessage(message) => {
                    let adopted = self.adopt(vec![message]);
                    let mut changed = false;
                    for message in adopted {
                        changed |= st.store.append(message);
                    }
                    changed
                }
                ServerFrame::OfflineMessages(batch) => {
                    let adopted = self.adopt(batch.messages);
                    let mut inserted = 0;
                    for message in adopted {
                        if st.store.append(message) {
                            inserted += 1;
                        }
                    }
                    if inserted > 0 {
                        crate::log_debug!("Merged {} offline messages", inserted);
                    }
                    inserted > 0
                }
                ServerFrame::ReadReceipt(receipt) => {
                    st.store.patch_read_receipt(&receipt.message_ids, receipt.read_at) > 0
                }
                ServerFrame::Typing(signal) => self.apply_typing(&mut st, &signal),
                ServerFrame::Unknown(kind) => {
                    crate::log_debug!("Ignoring unknown frame type '{}'", kind);
                    false
                }
            }
        };
        if changed {
            self.notify();
        }
    }

    fn apply_typing(self: &Arc<Self>, st: &mut SessionState, signal: &TypingSignal) -> bool {
        match st.typing.on_signal(signal) {
            TypingUpdate::Ignored => false,
            TypingUpdate::Cancel => {
                if let Some(timer) = st.typing_timer.take() {
                    timer.abort();
                }
                true
            }
            TypingUpdate::Restart(ticket) => {
                if let Some(timer) = st.typing_timer.take() {
                    timer.abort();
                }
                let weak = Arc::downgrade(self);
                let expiry = self.config.typing_expiry;
                st.typing_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(expiry).await;
                    if let Some(inner) = weak.upgrade() {
                        inner.expire_typing(ticket);
                    }
                }));
                true
            }
        }
    }

    fn expire_typing(&self, ticket: TypingTicket) {
        let expired = {
            let mut st = self.lock();
            let expired = st.typing.expire(ticket);
            if expired {
                st.typing_timer = None;
            }
            expired
        };
        if expired {
            self.notify();
        }
    }
}
