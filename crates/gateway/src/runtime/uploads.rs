//! Staging area for media uploaded with send requests.
//!
//! An upload is written to disk as `<basename>-<millis><ext>`, read back once
//! for transmission, and discarded afterwards whatever the outcome.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use sr_domain::error::{Error, Result};
use sr_transport::MediaBlob;

#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub path: PathBuf,
    /// Name the recipient sees.
    pub filename: String,
    pub mimetype: String,
}

pub struct UploadStaging {
    root: PathBuf,
}

impl UploadStaging {
    pub fn new(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stage(&self, original_name: &str, mimetype: &str, data: &[u8]) -> Result<StagedUpload> {
        let (base, ext) = split_name(original_name);
        let mut stamp = chrono::Utc::now().timestamp_millis();

        loop {
            let filename = format!("{base}-{stamp}{ext}");
            let path = self.root.join(&filename);
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    file.write_all(data)?;
                    tracing::debug!(file = %filename, bytes = data.len(), "upload staged");
                    return Ok(StagedUpload {
                        path,
                        filename,
                        mimetype: mimetype.to_owned(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    pub async fn load(&self, staged: &StagedUpload) -> Result<MediaBlob> {
        let data = tokio::fs::read(&staged.path).await?;
        Ok(MediaBlob {
            mimetype: staged.mimetype.clone(),
            data,
            filename: Some(staged.filename.clone()),
        })
    }

    pub async fn discard(&self, staged: StagedUpload) {
        if let Err(e) = tokio::fs::remove_file(&staged.path).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %staged.path.display(), error = %e, "failed to remove staged upload");
            }
        }
    }
}

/// Split an uploaded file name into a sanitized base and its extension
/// (with the dot). Directory components are dropped.
fn split_name(original: &str) -> (String, String) {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let path = Path::new(name);
    let base = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("upload");
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", sanitize(e)))
        .unwrap_or_default();
    (sanitize(base), ext)
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
