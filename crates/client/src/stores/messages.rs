//! Message store for a single conversation.
//!
//! The store is the only place the conversation's message list is mutated.
//! It keeps messages in arrival order (pages are merged at the head, live
//! messages at the tail) and enforces id uniqueness on every insert path.
//! Rendering goes through [`MessageStore::sorted`], which orders by
//! `created_at`.

use std::collections::HashSet;

use casesync_shared::Message;
use chrono::{DateTime, Utc};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MessageStore {
    /// Messages in arrival order.
    messages: Vec<Message>,
    ids: HashSet<String>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Messages in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Messages sorted by `created_at` ascending. Ties keep arrival order.
    pub fn sorted(&self) -> Vec<Message> {
        let mut out = self.messages.clone();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    /// Id of the oldest message by `created_at`, used as the pagination cursor.
    /// Placeholders never anchor a cursor.
    pub fn oldest_id(&self) -> Option<&str> {
        self.messages
            .iter()
            .filter(|m| !m.is_placeholder())
            .min_by(|a, b| a.created_at.cmp(&b.created_at))
            .map(|m| m.id.as_str())
    }

    /// Add a message at the tail.
    /// Returns false if a message with the same ID already exists (deduplication).
    pub fn append(&mut self, msg: Message) -> bool {
        if !self.ids.insert(msg.id.clone()) {
            return false;
        }
        self.messages.push(msg);
        true
    }

    /// Merge a page of older messages at the head, skipping ids already
    /// present (in the store or earlier in the page). Returns how many were
    /// inserted.
    pub fn prepend(&mut self, older: Vec<Message>) -> usize {
        let mut fresh = Vec::with_capacity(older.len());
        for msg in older {
            if self.ids.insert(msg.id.clone()) {
                fresh.push(msg);
            }
        }
        let inserted = fresh.len();
        if inserted > 0 {
            fresh.append(&mut self.messages);
            self.messages = fresh;
        }
        inserted
    }

    /// Set `read_at` on every listed message that is present. Returns the
    /// number of messages patched; unknown ids are ignored.
    pub fn patch_read_receipt(&mut self, message_ids: &[String], read_at: DateTime<Utc>) -> usize {
        let wanted: HashSet<&str> = message_ids.iter().map(String::as_str).collect();
        let mut patched = 0;
        for msg in self.messages.iter_mut() {
            if wanted.contains(msg.id.as_str()) {
                msg.read_at = Some(read_at);
                patched += 1;
            }
        }
        patched
    }

    /// Swap the message `old_id` for `new_msg` in place.
    ///
    /// No-op (returns false) if `old_id` is gone. If `new_msg`'s id is already
    /// stored under a different entry, the old entry is dropped instead so ids
    /// stay unique.
    pub fn replace(&mut self, old_id: &str, new_msg: Message) -> bool {
        let Some(pos) = self.messages.iter().position(|m| m.id == old_id) else {
            return false;
        };

        if new_msg.id != old_id && self.ids.contains(&new_msg.id) {
            self.messages.remove(pos);
            self.ids.remove(old_id);
            return true;
        }

        self.ids.remove(old_id);
        self.ids.insert(new_msg.id.clone());
        self.messages[pos] = new_msg;
        true
    }

    /// Remove a message by id. Returns the removed message, if any.
    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let pos = self.messages.iter().position(|m| m.id == id)?;
        self.ids.remove(id);
        Some(self.messages.remove(pos))
    }

    /// Replace the whole list with a freshly fetched history.
    pub fn set_history(&mut self, messages: Vec<Message>) {
        self.clear();
        for msg in messages {
            self.append(msg);
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }
}
