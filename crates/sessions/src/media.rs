//! Blob store for downloaded media.
//!
//! Files are named `<message id>.<subtype>` and never pruned here; retention
//! is left to the operator.

use std::path::{Path, PathBuf};

use sr_domain::error::{Error, Result};

pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(Error::Io)?;
        tracing::info!(path = %root.display(), "media store ready");
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derive the stored filename from a message id and a declared MIME type.
    ///
    /// `image/jpeg` gives `<id>.jpeg`; parameters such as `; codecs=opus` are
    /// dropped and anything outside `[A-Za-z0-9._-]` becomes `_`.
    pub fn filename_for(message_id: &str, mimetype: &str) -> String {
        let subtype = mimetype
            .split('/')
            .nth(1)
            .and_then(|s| s.split(';').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("bin");
        let stem = sanitize(message_id);
        format!("{stem}.{}", sanitize(subtype))
    }

    /// Write `data` and return the filename it is served under.
    pub async fn store(&self, message_id: &str, mimetype: &str, data: &[u8]) -> Result<String> {
        let filename = Self::filename_for(message_id, mimetype);
        let path = self.root.join(&filename);
        tokio::fs::write(&path, data).await.map_err(Error::Io)?;
        tracing::debug!(file = %filename, bytes = data.len(), "media stored");
        Ok(filename)
    }
}

fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "_".to_owned()
    } else {
        trimmed.to_owned()
    }
}
