//! Outbound operations: optimistic send, read marking, typing indicator.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use casesync_shared::{
    is_placeholder_id, ClientFrame, Message, SendMessageRequest, SendMessageResponse,
    TypingIndicator, PLACEHOLDER_PREFIX,
};
use chrono::Utc;
use uuid::Uuid;

use super::{ConversationSession, SessionInner};
use crate::api_client::MessagingApi;
use crate::error::SyncError;

/// A placeholder shown while its send is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSend {
    /// Correlates the network result with this placeholder.
    pub correlation: Uuid,
    pub placeholder_id: String,
    pub request: SendMessageRequest,
}

impl ConversationSession {
    /// Send `content` to the other party.
    ///
    /// The placeholder is appended to the store before this returns, so it is
    /// visible before the returned future is even polled. The request itself
    /// runs on its own task and reconciles the placeholder whether or not the
    /// returned future is awaited. That future resolves to the confirmed
    /// message; on failure the placeholder has already been removed when the
    /// error is returned.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn send(
        &self,
        content: impl Into<String>,
    ) -> impl Future<Output = Result<Message, SyncError>> + Send + 'static {
        let delivery = self.inner.begin_send(content.into()).map(|pending| {
            tokio::spawn(deliver(
                Arc::downgrade(&self.inner),
                Arc::clone(&self.inner.api),
                self.inner.params.current_user_id.clone(),
                pending,
            ))
        });
        async move {
            match delivery?.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    crate::log_error!("Send task ended early: {}", e);
                    Err(SyncError::Unmounted)
                }
            }
        }
    }

    /// Tell the server these messages were read. Failures are logged, never
    /// returned.
    pub async fn mark_as_read(&self, message_ids: Vec<String>) {
        self.inner.mark_as_read(message_ids).await;
    }

    /// Emit a typing indicator to the other party. Silently dropped unless
    /// the socket is open.
    pub fn set_typing_indicator(&self, is_typing: bool) {
        self.inner.set_typing_indicator(is_typing);
    }
}

/// Network half of a send. Holds the session weakly so an abandoned send
/// does not keep it alive.
async fn deliver(
    session: Weak<SessionInner>,
    api: Arc<dyn MessagingApi>,
    viewer: String,
    pending: PendingSend,
) -> Result<Message, SyncError> {
    let outcome = match api.send_message(&pending.request).await {
        Ok(SendMessageResponse::Confirmed { data }) => Ok(data.with_viewer(&viewer)),
        Ok(SendMessageResponse::Rejected { error }) => Err(SyncError::Rejected(error)),
        Err(e) => Err(SyncError::Api(e)),
    };
    if let Some(inner) = session.upgrade() {
        inner.finish_send(&pending, &outcome);
    }
    outcome
}

impl SessionInner {
    fn begin_send(&self, content: String) -> Result<PendingSend, SyncError> {
        if self.params.case_id.trim().is_empty() {
            return Err(SyncError::EmptyCaseId);
        }
        if content.trim().is_empty() {
            return Err(SyncError::EmptyContent);
        }

        let seq = self.placeholder_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let pending = PendingSend {
            correlation: Uuid::new_v4(),
            placeholder_id: format!("{}{}", PLACEHOLDER_PREFIX, seq),
            request: SendMessageRequest {
                case_id: self.params.case_id.clone(),
                recipient_id: self.params.other_user_id.clone(),
                content,
            },
        };

        let placeholder = Message {
            id: pending.placeholder_id.clone(),
            case_id: pending.request.case_id.clone(),
            sender_id: self.params.current_user_id.clone(),
            sender_name: self.params.current_user_name.clone(),
            sender_role: self.params.current_user_role.clone(),
            recipient_id: pending.request.recipient_id.clone(),
            content: pending.request.content.clone(),
            attachments: Vec::new(),
            created_at: Utc::now(),
            read_at: None,
            is_mine: true,
        };

        {
            let mut st = self.lock();
            if st.unmounted {
                return Err(SyncError::Unmounted);
            }
            st.store.append(placeholder);
            st.pending
                .insert(pending.correlation, pending.placeholder_id.clone());
        }
        self.notify();
        Ok(pending)
    }

    /// Swap the placeholder for the confirmed message, or roll it back.
    fn finish_send(&self, pending: &PendingSend, outcome: &Result<Message, SyncError>) {
        {
            let mut st = self.lock();
            let Some(placeholder_id) = st.pending.remove(&pending.correlation) else {
                return;
            };
            if st.unmounted {
                return;
            }
            match outcome {
                Ok(confirmed) => {
                    if !st.store.replace(&placeholder_id, confirmed.clone()) {
                        // A failed refetch cleared the list meanwhile.
                        st.store.append(confirmed.clone());
                    }
                }
                Err(e) => {
                    crate::log_warn!("Send failed, rolling back {}: {}", placeholder_id, e);
                    st.store.remove(&placeholder_id);
                }
            }
        }
        self.notify();
    }

    async fn mark_as_read(&self, message_ids: Vec<String>) {
        let ids: Vec<String> = message_ids
            .into_iter()
            .filter(|id| !id.is_empty() && !is_placeholder_id(id))
            .collect();
        let unmounted = self.lock().unmounted;
        if ids.is_empty() || unmounted {
            return;
        }

        let result = self.api.mark_read(&ids).await;

        let mut st = self.lock();
        match result {
            Ok(()) => st.read_failures = 0,
            Err(e) => {
                st.read_failures += 1;
                let threshold = self.config.read_failure_alert_threshold.max(1);
                if st.read_failures % threshold == 0 {
                    crate::log_error!(
                        "Mark-as-read failed {} times in a row: {}",
                        st.read_failures,
                        e
                    );
                } else {
                    crate::log_warn!("Mark-as-read failed: {}", e);
                }
            }
        }
    }

    fn set_typing_indicator(&self, is_typing: bool) {
        let st = self.lock();
        if !st.connection.is_open() {
            return;
        }
        let frame = ClientFrame::Typing(TypingIndicator {
            case_id: self.params.case_id.clone(),
            recipient_id: self.params.other_user_id.clone(),
            is_typing,
        });
        if !st.connection.send(&frame) {
            crate::log_debug!("Typing indicator dropped");
        }
    }
}
