//! Per-conversation state containers.

pub mod messages;
pub mod presence;

pub use messages::MessageStore;
pub use presence::{TypingTicket, TypingTracker, TypingUpdate};
