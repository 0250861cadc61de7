use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// On-disk layout.
///
/// Session records live in `<state_path>/sessions/<id>.json`, transport
/// credential snapshots in `<state_path>/credentials/<id>/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
    /// Downloaded media, served read-only under `messages.media_mount`.
    #[serde(default = "d_media_path")]
    pub media_path: PathBuf,
    /// Staging area for uploaded attachments awaiting transmission.
    #[serde(default = "d_uploads_path")]
    pub uploads_path: PathBuf,
    #[serde(default = "d_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            media_path: d_media_path(),
            uploads_path: d_uploads_path(),
            max_upload_bytes: d_max_upload_bytes(),
        }
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from("./data/state")
}
fn d_media_path() -> PathBuf {
    PathBuf::from("./media")
}
fn d_uploads_path() -> PathBuf {
    PathBuf::from("./uploads")
}
fn d_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}
