//! Socket connection types shared by the connection manager and transports.
//!
//! A [`Transport`] opens sockets. Opening is synchronous and never fails
//! directly: progress and failures arrive on the returned event stream, the
//! same way a browser WebSocket reports them.

use std::time::Duration;

use casesync_shared::ClientFrame;
use futures_channel::mpsc::{UnboundedReceiver, UnboundedSender};

/// Connection state for the conversation socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay in milliseconds
    pub initial_delay_ms: u32,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u32,
    /// Multiplier for exponential backoff (1.0 = fixed delay)
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: 3000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> u32 {
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(attempt as i32);
        (delay as u32).min(self.max_delay_ms.max(self.initial_delay_ms))
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_for_attempt(attempt) as u64)
    }

    /// Whether another reconnect may be scheduled after `attempt` failures.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt < self.max_attempts
    }
}

/// Something that happened on an open (or opening) socket.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Open,
    Message(String),
    Error(String),
    Closed,
}

/// Command for the socket's writer.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketCommand {
    Text(String),
    Close,
}

/// Handle for writing to one socket
#[derive(Debug, Clone)]
pub struct WsHandle {
    sender: UnboundedSender<SocketCommand>,
}

impl WsHandle {
    pub fn new(sender: UnboundedSender<SocketCommand>) -> Self {
        Self { sender }
    }

    /// Queue a frame for sending
    pub fn send(&self, frame: &ClientFrame) -> Result<(), String> {
        let json = frame
            .to_json()
            .map_err(|e| format!("Failed to encode frame: {}", e))?;
        self.sender
            .unbounded_send(SocketCommand::Text(json))
            .map_err(|e| format!("Failed to send: {}", e))
    }

    /// Ask the transport to close the socket. Safe to call more than once.
    pub fn close(&self) {
        let _ = self.sender.unbounded_send(SocketCommand::Close);
        self.sender.close_channel();
    }
}

/// One opened socket: a write handle plus its event stream.
pub struct SocketLink {
    pub handle: WsHandle,
    pub events: UnboundedReceiver<SocketEvent>,
}

/// Opens sockets. Implementations must report the outcome on `events`:
/// `Open` on success, `Error`/`Closed` otherwise, and `Closed` exactly when
/// the socket is gone.
pub trait Transport: Send + Sync {
    fn open(&self, url: &str) -> SocketLink;
}

mod connection_native;
pub use connection_native::TungsteniteTransport;

#[cfg(test)]
mod tests {
    use super::*;
    use futures_channel::mpsc::unbounded;

    #[test]
    fn test_fixed_delay_by_default() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(0), 3000);
        assert_eq!(config.delay_for_attempt(7), 3000);
        assert!(config.allows(10_000));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let config = ReconnectConfig {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 8000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(config.delay_for_attempt(0), 1000);
        assert_eq!(config.delay_for_attempt(2), 4000);
        assert_eq!(config.delay_for_attempt(10), 8000);
        assert!(config.allows(4));
        assert!(!config.allows(5));
    }

    #[test]
    fn test_handle_close_is_idempotent() {
        let (tx, mut rx) = unbounded();
        let handle = WsHandle::new(tx);
        handle.close();
        handle.close();
        assert_eq!(rx.try_next().unwrap(), Some(SocketCommand::Close));
        // Channel closed after the first close
        assert_eq!(rx.try_next().unwrap(), None);
        assert!(handle
            .send(&ClientFrame::Typing(casesync_shared::TypingIndicator {
                case_id: "c".into(),
                recipient_id: "r".into(),
                is_typing: true,
            }))
            .is_err());
    }
}
