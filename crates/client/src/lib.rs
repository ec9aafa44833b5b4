//! casesync client - realtime sync engine for case conversations
//!
//! This crate keeps a local, deduplicated view of one two-party conversation
//! in sync with the server over an unreliable socket. It reconciles
//! optimistic sends, merges history pages, tracks the other party's typing
//! state and reconnects on its own.
//!
//! ```rust,ignore
//! let session = ConversationSession::new(
//!     params,
//!     Arc::new(ApiClient::new().with_base_url(api_url).with_token(token)),
//!     Arc::new(TungsteniteTransport::new()),
//!     move |token| socket_url(&ws_url, token),
//!     SyncConfig::from_env(),
//! );
//! session.mount();
//!
//! let confirmed = session.send("Documents uploaded").await?;
//! ```

pub mod api_client;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod stores;
pub mod ws;

pub use api_client::{ApiClient, MessagingApi};
pub use config::{socket_url, ClientConfig, SyncConfig};
pub use error::SyncError;
pub use session::{ConversationParams, ConversationSession, ConversationView, PendingSend};
pub use ws::{ConnectionState, ReconnectConfig, SocketEvent, SocketLink, Transport, WsHandle};
