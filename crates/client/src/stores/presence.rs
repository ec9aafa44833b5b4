//! Typing state for the other party of a conversation.
//!
//! The tracker holds no timers itself. Every accepted "started typing" signal
//! returns a fresh [`TypingTicket`]; the owner schedules an expiry with it and
//! hands it back to [`TypingTracker::expire`]. Tickets from superseded
//! signals are rejected, so an expiry fires at most once per signal burst.

use casesync_shared::TypingSignal;

/// Proof of a specific "started typing" signal, used to expire it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingTicket(u64);

/// What the owner must do with its expiry timer after a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingUpdate {
    /// Signal was for another case or from ourselves.
    Ignored,
    /// Clear any pending timer and schedule a new one for this ticket.
    Restart(TypingTicket),
    /// Clear any pending timer.
    Cancel,
}

#[derive(Debug, Clone)]
pub struct TypingTracker {
    case_id: String,
    current_user_id: String,
    is_typing: bool,
    generation: u64,
}

impl TypingTracker {
    pub fn new(case_id: impl Into<String>, current_user_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            current_user_id: current_user_id.into(),
            is_typing: false,
            generation: 0,
        }
    }

    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    /// Apply an inbound typing signal.
    pub fn on_signal(&mut self, signal: &TypingSignal) -> TypingUpdate {
        if signal.case_id != self.case_id || signal.user_id == self.current_user_id {
            return TypingUpdate::Ignored;
        }

        // Any accepted signal invalidates outstanding tickets.
        self.generation += 1;
        if signal.is_typing {
            self.is_typing = true;
            TypingUpdate::Restart(TypingTicket(self.generation))
        } else {
            self.is_typing = false;
            TypingUpdate::Cancel
        }
    }

    /// Expire the signal identified by `ticket`. Returns true if the flag
    /// flipped to false.
    pub fn expire(&mut self, ticket: TypingTicket) -> bool {
        if ticket.0 != self.generation || !self.is_typing {
            return false;
        }
        self.is_typing = false;
        true
    }

    /// Drop typing state, e.g. on teardown.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.is_typing = false;
    }
}
