use std::sync::Arc;

use sr_domain::config::Config;
use sr_sessions::{MediaStore, SessionStore};

use crate::runtime::ingest::MessageIngestionPipeline;
use crate::runtime::uploads::UploadStaging;
use crate::runtime::SessionRegistry;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Session management ────────────────────────────────────────────
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<SessionStore>,

    // ── Messages & media ──────────────────────────────────────────────
    pub pipeline: Arc<MessageIngestionPipeline>,
    pub media: Arc<MediaStore>,
    pub uploads: Arc<UploadStaging>,

    // ── Security ──────────────────────────────────────────────────────
    /// SHA-256 of the control-API passkey, read once at startup. `None`
    /// leaves the API open (dev mode).
    pub passkey_hash: Option<Vec<u8>>,
}
