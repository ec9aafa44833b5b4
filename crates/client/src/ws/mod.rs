//! Realtime socket layer for a conversation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                ConversationSession                  │
//! │   (timers, socket pump, dispatch into the stores)   │
//! └─────────────────────────────────────────────────────┘
//!          │ events in                 ▲ decisions out
//!          ▼                           │
//!   ┌─────────────────────────────────────────┐
//!   │           ConnectionManager             │
//!   │ connecting → open → closed → connecting │
//!   └─────────────────────────────────────────┘
//!                         │ open(url)
//!                         ▼
//!              ┌─────────────────────┐
//!              │   dyn Transport     │
//!              │ (tungstenite, mock) │
//!              └─────────────────────┘
//! ```
//!
//! The manager is synchronous and owns no timers, which keeps the state
//! machine testable without a runtime. Transports are injected, so tests can
//! drive socket events by hand.

mod connection;
mod manager;

pub use connection::{
    ConnectionState, ReconnectConfig, SocketCommand, SocketEvent, SocketLink, Transport,
    TungsteniteTransport, WsHandle,
};
pub use manager::{CloseOutcome, ConnectionManager};
