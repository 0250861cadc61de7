//! Durable state for sessionrelay.
//!
//! One JSON record per session id, transport credential snapshots kept
//! beside them, and the media blob store served under the static mount.

pub mod credentials;
pub mod media;
pub mod store;

pub use credentials::CredentialStore;
pub use media::MediaStore;
pub use store::{validate_key, SessionRecord, SessionStore};
