//! Shared types for casesync clients: conversation models, realtime frames
//! and API errors.

pub mod models;
pub mod protocol;
pub mod error;

pub use models::*;
pub use protocol::*;
pub use error::*;
