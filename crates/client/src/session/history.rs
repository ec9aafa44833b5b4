//! Initial history load and backwards pagination.

use std::collections::HashSet;

use casesync_shared::{HistoryQuery, Message};

use super::{ConversationSession, SessionInner, SessionState};
use crate::error::SyncError;

impl ConversationSession {
    /// Reload the latest page of history, replacing what is loaded.
    /// Placeholders and messages that arrived while the request was out are
    /// kept.
    ///
    /// On failure the message list is emptied and `error` is set; the error
    /// is also returned.
    pub async fn refetch(&self) -> Result<(), SyncError> {
        self.inner.refetch().await
    }

    /// Fetch the page before the oldest loaded message and merge it at the
    /// head. No-op when nothing is loaded yet or a page is already in flight.
    pub async fn load_more(&self) -> Result<(), SyncError> {
        self.inner.load_more().await
    }
}

/// Clears a loading flag if the request future is dropped before the
/// response is applied.
struct InFlight<'a> {
    inner: &'a SessionInner,
    flag: fn(&mut SessionState) -> &mut bool,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(inner: &'a SessionInner, flag: fn(&mut SessionState) -> &mut bool) -> Self {
        Self {
            inner,
            flag,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut st = self.inner.lock();
        *(self.flag)(&mut st) = false;
        drop(st);
        self.inner.notify();
    }
}

fn initial_load(st: &mut SessionState) -> &mut bool {
    &mut st.is_loading
}

fn older_page(st: &mut SessionState) -> &mut bool {
    &mut st.loading_more
}

impl SessionInner {
    pub(super) async fn refetch(&self) -> Result<(), SyncError> {
        let known: HashSet<String> = {
            let mut st = self.lock();
            if st.unmounted {
                return Err(SyncError::Unmounted);
            }
            st.is_loading = true;
            st.error = None;
            st.store.iter().map(|m| m.id.clone()).collect()
        };
        let mut in_flight = InFlight::new(self, initial_load);
        self.notify();

        let query = HistoryQuery {
            other_user_id: self.params.other_user_id.clone(),
            before_id: None,
            limit: Some(self.config.page_size),
        };
        let result = self.api.fetch_history(&self.params.case_id, &query).await;
        in_flight.disarm();

        let outcome = {
            let mut st = self.lock();
            if st.unmounted {
                return Err(SyncError::Unmounted);
            }
            st.is_loading = false;
            match result {
                Ok(page) => {
                    let page_messages = self.adopt(page.messages);
                    // Everything loaded before the request is superseded by
                    // the page, older pages included, so the cursor matches
                    // `has_more`.
                    let carried: Vec<Message> = st
                        .store
                        .iter()
                        .filter(|m| m.is_placeholder() || !known.contains(&m.id))
                        .cloned()
                        .collect();

                    st.store.set_history(page_messages);
                    for message in carried {
                        st.store.append(message);
                    }
                    st.has_more = page.has_more;
                    crate::log_debug!(
                        "Loaded {} messages for case {} (total {})",
                        st.store.len(),
                        self.params.case_id,
                        page.total
                    );
                    Ok(())
                }
                Err(e) => {
                    let err = SyncError::from(e);
                    crate::log_error!(
                        "Failed to load history for case {}: {}",
                        self.params.case_id,
                        err
                    );
                    st.store.clear();
                    st.has_more = false;
                    st.error = Some(err.user_message());
                    Err(err)
                }
            }
        };
        self.notify();
        outcome
    }

    pub(super) async fn load_more(&self) -> Result<(), SyncError> {
        let cursor = {
            let mut st = self.lock();
            if st.unmounted {
                return Err(SyncError::Unmounted);
            }
            if st.loading_more {
                return Ok(());
            }
            let Some(oldest) = st.store.oldest_id().map(str::to_string) else {
                return Ok(());
            };
            st.loading_more = true;
            oldest
        };
        let mut in_flight = InFlight::new(self, older_page);
        self.notify();

        let query = HistoryQuery {
            other_user_id: self.params.other_user_id.clone(),
            before_id: Some(cursor),
            limit: Some(self.config.page_size),
        };
        let result = self.api.fetch_history(&self.params.case_id, &query).await;
        in_flight.disarm();

        let outcome = {
            let mut st = self.lock();
            st.loading_more = false;
            if st.unmounted {
                return Err(SyncError::Unmounted);
            }
            match result {
                Ok(page) => {
                    let inserted = st.store.prepend(self.adopt(page.messages));
                    st.has_more = page.has_more;
                    crate::log_debug!("Prepended {} older messages", inserted);
                    Ok(())
                }
                Err(e) => {
                    crate::log_warn!("Failed to load older messages: {}", e);
                    Err(SyncError::from(e))
                }
            }
        };
        self.notify();
        outcome
    }
}
