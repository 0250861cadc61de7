//! Boundary to the external messaging transport.
//!
//! The relay never speaks the messaging protocol itself. It drives a
//! [`TransportClient`] per session and consumes the [`TransportEvent`] stream
//! that comes with it. [`bridge`] talks to a protocol sidecar over HTTP and
//! WebSocket; [`mock`] is a scriptable stand-in for tests.

pub mod bridge;
pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::TransportError;
pub use traits::{TransportClient, TransportFactory};
pub use types::{
    ChatSummary, InboundMessage, MediaBlob, OutgoingContent, SessionOptions, TransportEvent,
    TransportSession,
};
