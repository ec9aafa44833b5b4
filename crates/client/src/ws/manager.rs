//! Connection state machine for one conversation socket.
//!
//! `ConnectionManager` decides; it never sleeps or spawns. The owning
//! session feeds it socket events and acts on what it returns (e.g. arming
//! the reconnect timer on [`CloseOutcome::Schedule`]).
//!
//! Every connection attempt gets a generation number. Events tagged with an
//! older generation belong to a superseded socket and are dropped.

use std::time::Duration;

use casesync_shared::ClientFrame;

use super::connection::{ConnectionState, ReconnectConfig, WsHandle};

/// Result of feeding a close event to the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Event belonged to a superseded socket or the manager is torn down.
    Ignored,
    /// A reconnect was already pending; nothing new to schedule.
    AlreadyScheduled,
    /// Arm exactly one reconnect timer with this delay.
    Schedule(Duration),
    /// Reconnect attempts exhausted.
    GaveUp,
}

#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    ws_error: Option<String>,
    error_message: String,
    reconnect: ReconnectConfig,
    reconnect_pending: bool,
    /// Reconnects scheduled since the last successful open.
    attempt: u32,
    generation: u64,
    /// An attempt has started but its socket is not attached yet
    /// (e.g. waiting for a token).
    attempt_in_flight: bool,
    socket: Option<WsHandle>,
    torn_down: bool,
}

impl ConnectionManager {
    pub fn new(reconnect: ReconnectConfig, error_message: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Connecting,
            ws_error: None,
            error_message: error_message.into(),
            reconnect,
            reconnect_pending: false,
            attempt: 0,
            generation: 0,
            attempt_in_flight: false,
            socket: None,
            torn_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    pub fn ws_error(&self) -> Option<&str> {
        self.ws_error.as_deref()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn is_current(&self, generation: u64) -> bool {
        !self.torn_down && generation == self.generation
    }

    /// Start a new connection attempt.
    ///
    /// Returns the attempt's generation, or `None` if a socket is already
    /// pending or open (or the manager is torn down). An earlier attempt that
    /// is still waiting for its socket is superseded.
    pub fn begin_attempt(&mut self) -> Option<u64> {
        if self.torn_down || self.socket.is_some() {
            return None;
        }
        self.generation += 1;
        self.attempt_in_flight = true;
        self.reconnect_pending = false;
        self.state = ConnectionState::Connecting;
        Some(self.generation)
    }

    /// Attach the socket opened for `generation`.
    ///
    /// Returns the handle back if the attempt was superseded meanwhile; the
    /// caller should close it.
    pub fn attach(&mut self, generation: u64, handle: WsHandle) -> Result<(), WsHandle> {
        if !self.is_current(generation) || !self.attempt_in_flight {
            return Err(handle);
        }
        self.attempt_in_flight = false;
        self.socket = Some(handle);
        Ok(())
    }

    /// Drop an attempt that will never attach a socket, without scheduling a
    /// reconnect. Returns false if `generation` is stale or already attached.
    pub fn abandon(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) || !self.attempt_in_flight {
            return false;
        }
        self.attempt_in_flight = false;
        self.state = ConnectionState::Closed;
        true
    }

    /// Socket reached the open state. Returns true if the event was applied.
    pub fn on_open(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) || self.socket.is_none() {
            return false;
        }
        self.ws_error = None;
        self.state = ConnectionState::Open;
        self.attempt = 0;
        true
    }

    /// Transport error. Sets the user-facing error string without touching
    /// the connection state. Returns true if the visible error changed.
    pub fn on_error(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        if self.ws_error.as_deref() == Some(self.error_message.as_str()) {
            return false;
        }
        self.ws_error = Some(self.error_message.clone());
        true
    }

    /// Socket closed (or the attempt failed before a socket existed).
    pub fn on_close(&mut self, generation: u64) -> CloseOutcome {
        if !self.is_current(generation) {
            return CloseOutcome::Ignored;
        }
        self.socket = None;
        self.attempt_in_flight = false;
        self.state = ConnectionState::Closed;

        if self.reconnect_pending {
            return CloseOutcome::AlreadyScheduled;
        }
        if !self.reconnect.allows(self.attempt) {
            return CloseOutcome::GaveUp;
        }

        let delay = self.reconnect.delay(self.attempt);
        self.attempt += 1;
        self.reconnect_pending = true;
        CloseOutcome::Schedule(delay)
    }

    /// Send a frame if the socket is open. Returns whether it was queued.
    pub fn send(&self, frame: &ClientFrame) -> bool {
        match (&self.socket, self.state) {
            (Some(handle), ConnectionState::Open) => handle.send(frame).is_ok(),
            _ => false,
        }
    }

    /// Stop for good. Returns the socket handle, if any, so the caller can
    /// close it.
    pub fn teardown(&mut self) -> Option<WsHandle> {
        self.torn_down = true;
        self.reconnect_pending = false;
        self.attempt_in_flight = false;
        self.state = ConnectionState::Closed;
        self.socket.take()
    }
}
