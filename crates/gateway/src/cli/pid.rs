//! Single-instance guard.
//!
//! The session registry assumes it is the only writer of its state
//! directory. `serve` takes an `fs2` exclusive lock on the configured PID file
//! and holds it until shutdown; a second instance fails fast.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use fs2::FileExt;

/// A held PID-file lock. Dropping it releases the lock but leaves the file;
/// [`PidLock::release`] removes it too.
#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
    file: File,
}

impl PidLock {
    pub fn acquire(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        // Not truncated before the lock is ours, so a running instance keeps
        // its PID on disk.
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("opening PID file {}", path.display()))?;

        file.try_lock_exclusive().map_err(|_| {
            let holder = fs::read_to_string(path).unwrap_or_default();
            anyhow::anyhow!(
                "another sessionrelay instance holds {} (pid {})",
                path.display(),
                holder.trim()
            )
        })?;

        let pid = std::process::id();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{pid}")?;
        file.flush()?;

        tracing::info!(path = %path.display(), pid, "PID file locked");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove PID file");
        }
        drop(self.file);
    }
}
