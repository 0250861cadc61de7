//! Durable session record store.
//!
//! Each session id owns `<state_path>/sessions/<id>.json`. Writes replace
//! the whole record; there is no merging and no history.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use sr_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Caller-controlled configuration of a session, as persisted on disk.
///
/// Runtime state (status, retry counter, the live transport handle) is never
/// written here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub callback_url: String,
    #[serde(default)]
    pub message_callback_url: Option<String>,
    /// Older records call this `loadMessages`.
    #[serde(default, alias = "loadMessages")]
    pub relay_messages: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl SessionRecord {
    pub fn new(callback_url: impl Into<String>, message_callback_url: Option<String>) -> Self {
        let relay_messages = message_callback_url.is_some();
        Self {
            callback_url: callback_url.into(),
            message_callback_url,
            relay_messages,
            deleted: false,
        }
    }
}

/// Reject ids that cannot safely be used as a file stem.
pub fn validate_key(id: &str) -> Result<()> {
    let bad = id.is_empty()
        || id.len() > 128
        || id == "."
        || id == ".."
        || id.chars().any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control());
    if bad {
        return Err(Error::InvalidKey(id.to_owned()));
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl SessionStore {
    /// Open (or create) the record directory at `state_path/sessions/`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;

        tracing::info!(path = %dir.display(), "session store ready");

        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_key(id)?;
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Overwrite the record for `id`.
    pub fn save(&self, id: &str, record: &SessionRecord) -> Result<()> {
        let path = self.path_for(id)?;
        let _guard = self.write_lock.lock();
        write_atomic(&path, record)
    }

    /// Load the record for `id`. A missing record is `Ok(None)`.
    pub fn load(&self, id: &str) -> Result<Option<SessionRecord>> {
        let path = self.path_for(id)?;
        read_record(&path)
    }

    /// Apply `f` to the stored record and write it back.
    ///
    /// Returns `Ok(false)` without writing when no record exists.
    pub fn update<F>(&self, id: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut SessionRecord),
    {
        let path = self.path_for(id)?;
        let _guard = self.write_lock.lock();
        let Some(mut record) = read_record(&path)? else {
            return Ok(false);
        };
        f(&mut record);
        write_atomic(&path, &record)?;
        Ok(true)
    }

    /// Remove the record for `id`. Returns whether a record was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id)?;
        let _guard = self.write_lock.lock();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Enumerate every record on disk.
    ///
    /// Each entry carries its own parse result so one corrupt file does not
    /// hide the others.
    pub fn list(&self) -> Result<Vec<(String, Result<SessionRecord>)>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(Error::Io)? {
            let entry = entry.map_err(Error::Io)?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
                continue;
            };
            let record = read_record(&path).and_then(|r| {
                r.ok_or_else(|| Error::Other(format!("record {id} vanished during scan")))
            });
            out.push((id, record));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

fn read_record(path: &Path) -> Result<Option<SessionRecord>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

fn write_atomic(path: &Path, record: &SessionRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(Error::Io)?;
    std::fs::rename(&tmp, path).map_err(Error::Io)?;
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn missing_record_loads_as_none() {
        let (_dir, store) = store();
        assert!(store.load("nobody").unwrap().is_none());
    }

    #[test]
    fn save_overwrites_whole_record() {
        let (_dir, store) = store();
        store
            .save("t1", &SessionRecord::new("http://cb", Some("http://msg".into())))
            .unwrap();
        store.save("t1", &SessionRecord::new("http://cb2", None)).unwrap();

        let rec = store.load("t1").unwrap().unwrap();
        assert_eq!(rec.callback_url, "http://cb2");
        assert_eq!(rec.message_callback_url, None);
        assert!(!rec.relay_messages);
    }

    #[test]
    fn message_callback_enables_relay() {
        let rec = SessionRecord::new("http://cb", Some("http://msg".into()));
        assert!(rec.relay_messages);
        assert!(!rec.deleted);
    }

    #[test]
    fn update_skips_missing_record() {
        let (_dir, store) = store();
        let touched = store.update("ghost", |r| r.relay_messages = true).unwrap();
        assert!(!touched);
        assert!(store.load("ghost").unwrap().is_none());
    }

    #[test]
    fn update_rewrites_existing_record() {
        let (_dir, store) = store();
        store.save("t1", &SessionRecord::new("http://cb", None)).unwrap();
        assert!(store.update("t1", |r| r.relay_messages = true).unwrap());
        assert!(store.load("t1").unwrap().unwrap().relay_messages);
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, store) = store();
        store.save("t1", &SessionRecord::new("http://cb", None)).unwrap();
        assert!(store.delete("t1").unwrap());
        assert!(!store.delete("t1").unwrap());
        assert!(store.load("t1").unwrap().is_none());
    }

    #[test]
    fn reads_legacy_load_messages_field() {
        let (_dir, store) = store();
        std::fs::write(
            store.dir().join("old.json"),
            r#"{"callbackUrl":"http://cb","deleted":false,"loadMessages":true,"messageCallbackUrl":"http://m"}"#,
        )
        .unwrap();
        let rec = store.load("old").unwrap().unwrap();
        assert!(rec.relay_messages);
        assert_eq!(rec.message_callback_url.as_deref(), Some("http://m"));
    }

    #[test]
    fn list_reports_corrupt_records_individually() {
        let (_dir, store) = store();
        store.save("a", &SessionRecord::new("http://a", None)).unwrap();
        store.save("c", &SessionRecord::new("http://c", None)).unwrap();
        std::fs::write(store.dir().join("b.json"), "{ not json").unwrap();
        std::fs::write(store.dir().join("notes.txt"), "ignored").unwrap();

        let listed = store.list().unwrap();
        let ids: Vec<_> = listed.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(listed[0].1.is_ok());
        assert!(listed[1].1.is_err());
        assert!(listed[2].1.is_ok());
    }

    #[test]
    fn rejects_path_like_ids() {
        let (_dir, store) = store();
        for id in ["", "..", "a/b", "a\\b"] {
            assert!(store.load(id).is_err(), "id {id:?} should be rejected");
        }
        assert!(validate_key("tenant-1.main").is_ok());
    }
}
