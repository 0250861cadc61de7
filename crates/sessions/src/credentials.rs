//! Transport credential snapshots, one directory per session id.
//!
//! The snapshot is opaque to the relay: whatever the transport hands back
//! once a session is ready gets written here and handed back on resume.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use sr_domain::error::{Error, Result};

use crate::store::validate_key;

const SNAPSHOT_FILE: &str = "snapshot.json";
const REMOVE_ATTEMPTS: u32 = 5;
const REMOVE_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    /// Open (or create) `state_path/credentials/`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let root = state_path.join("credentials");
        std::fs::create_dir_all(&root).map_err(Error::Io)?;
        Ok(Self { root })
    }

    fn dir_for(&self, id: &str) -> Result<PathBuf> {
        validate_key(id)?;
        Ok(self.root.join(id))
    }

    pub fn save(&self, id: &str, snapshot: &Value) -> Result<()> {
        let dir = self.dir_for(id)?;
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        let tmp = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        std::fs::write(&tmp, serde_json::to_vec(snapshot)?).map_err(Error::Io)?;
        std::fs::rename(&tmp, dir.join(SNAPSHOT_FILE)).map_err(Error::Io)?;
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<Option<Value>> {
        let path = self.dir_for(id)?.join(SNAPSHOT_FILE);
        match std::fs::read(&path) {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Remove everything stored for `id`.
    ///
    /// A transport that has only just let go of its files can leave them
    /// locked for a moment, so permission errors are retried a few times.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let dir = self.dir_for(id)?;
        let mut attempt = 1;
        loop {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {
                    tracing::debug!(session_id = %id, "credential snapshot removed");
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e)
                    if e.kind() == std::io::ErrorKind::PermissionDenied
                        && attempt < REMOVE_ATTEMPTS =>
                {
                    tracing::warn!(
                        session_id = %id,
                        attempt,
                        error = %e,
                        "credential directory busy, retrying removal"
                    );
                    attempt += 1;
                    tokio::time::sleep(REMOVE_RETRY_DELAY).await;
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }
}
