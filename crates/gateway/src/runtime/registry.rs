//! Keyed directory of live sessions.
//!
//! Holds at most one live session per id. Create and delete for one id are
//! serialized through [`IdLockMap`]; lookups never wait on them. The durable
//! side lives in `SessionStore` and `CredentialStore`; [`SessionRegistry::recover`]
//! rebuilds the in-memory side from it on startup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use sr_domain::status::SessionStatus;
use sr_domain::trace::TraceEvent;
use sr_sessions::{validate_key, SessionRecord};

use super::error::SessionError;
use super::id_lock::IdLockMap;
use super::session::{self, SessionDeps, SessionHandle, SessionSeed};

/// Parameters of a create call.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: String,
    pub callback_url: String,
    pub message_callback_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// A live session was torn down and its durable state purged.
    Removed,
    /// No live session; leftover durable state was purged.
    NotLoaded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub recovered: usize,
    pub skipped: usize,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    op_locks: IdLockMap,
    deps: SessionDeps,
    shutdown: CancellationToken,
}

impl SessionRegistry {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            op_locks: IdLockMap::new(),
            deps,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn deps(&self) -> &SessionDeps {
        &self.deps
    }

    /// Create a session and start bringing it up.
    pub async fn create(&self, request: NewSession) -> Result<SessionHandle, SessionError> {
        if request.id.trim().is_empty() {
            return Err(SessionError::Validation("id is required".into()));
        }
        if request.callback_url.trim().is_empty() {
            return Err(SessionError::Validation("callbackUrl is required".into()));
        }
        validate_key(&request.id).map_err(|e| SessionError::Validation(e.to_string()))?;

        let permit = self
            .op_locks
            .acquire(&request.id)
            .await
            .map_err(|_| SessionError::Shutdown(request.id.clone()))?;

        let result = self.create_locked(request);
        drop(permit);
        self.op_locks.prune_idle();
        result
    }

    fn create_locked(&self, request: NewSession) -> Result<SessionHandle, SessionError> {
        if self.get(&request.id).is_some() {
            return Err(SessionError::AlreadyExists(request.id));
        }

        let message_callback_url = request
            .message_callback_url
            .filter(|url| !url.trim().is_empty());
        let record = SessionRecord::new(&request.callback_url, message_callback_url.clone());
        self.deps.store.save(&request.id, &record)?;

        let handle = self.start(SessionSeed {
            id: request.id.clone(),
            callback_url: record.callback_url,
            message_callback_url,
            relay_messages: record.relay_messages,
            attempt_local_resume: false,
            credentials: None,
        });
        tracing::info!(session_id = %request.id, "session created");
        TraceEvent::SessionCreated {
            session_id: request.id,
            resume: false,
        }
        .emit();
        Ok(handle)
    }

    /// The live session for `id`. Sessions with a delete in flight are hidden.
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions
            .read()
            .get(id)
            .filter(|handle| !handle.is_deleted())
            .cloned()
    }

    /// Like [`get`](Self::get), as a `NotFound` error.
    pub fn require(&self, id: &str) -> Result<SessionHandle, SessionError> {
        self.get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Per-id lock entries currently held or awaited.
    pub fn lock_entries(&self) -> usize {
        self.op_locks.len()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Delete a session.
    ///
    /// A live session must be ready for action. Once teardown starts, durable
    /// state is purged even when transport teardown fails; that failure is
    /// still reported.
    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome, SessionError> {
        validate_key(id).map_err(|e| SessionError::Validation(e.to_string()))?;
        let permit = self
            .op_locks
            .acquire(id)
            .await
            .map_err(|_| SessionError::Shutdown(id.to_owned()))?;

        let result = self.delete_locked(id).await;
        drop(permit);
        self.op_locks.prune_idle();
        result
    }

    async fn delete_locked(&self, id: &str) -> Result<DeleteOutcome, SessionError> {
        let Some(handle) = self.get(id) else {
            self.purge(id).await?;
            tracing::info!(session_id = %id, "delete of unloaded session purged durable state");
            return Ok(DeleteOutcome::NotLoaded);
        };

        let view = handle.view();
        if !view.ready_for_action {
            return Err(SessionError::NotReadyForAction(id.to_owned()));
        }

        handle.mark_deleted();
        let destroy = !matches!(
            view.status,
            SessionStatus::Disconnected | SessionStatus::AuthFailure
        );
        let teardown = handle.teardown(destroy).await;
        if let Err(e) = &teardown {
            tracing::warn!(session_id = %id, error = %e, "transport teardown failed, purging anyway");
        }

        self.sessions.write().remove(id);
        let purge = self.purge(id).await;

        TraceEvent::SessionDeleted {
            session_id: id.to_owned(),
            teardown_ok: teardown.is_ok(),
        }
        .emit();
        tracing::info!(session_id = %id, "session deleted");

        teardown?;
        purge?;
        Ok(DeleteOutcome::Removed)
    }

    async fn purge(&self, id: &str) -> Result<(), SessionError> {
        let record = self.deps.store.delete(id);
        let credentials = self.deps.credentials.remove(id).await;
        record?;
        credentials?;
        Ok(())
    }

    /// Rebuild live sessions from durable records.
    ///
    /// Records that fail to parse, carry the deleted flag, or already have a
    /// live session are skipped. Recovered sessions try to resume from their
    /// stored credentials.
    pub async fn recover(&self) -> Result<RecoveryReport, SessionError> {
        let mut report = RecoveryReport::default();

        for (id, record) in self.deps.store.list()? {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "skipping unreadable session record");
                    report.skipped += 1;
                    continue;
                }
            };
            if record.deleted {
                tracing::debug!(session_id = %id, "skipping deleted session record");
                report.skipped += 1;
                continue;
            }

            let _permit = self
                .op_locks
                .acquire(&id)
                .await
                .map_err(|_| SessionError::Shutdown(id.clone()))?;
            if self.get(&id).is_some() {
                report.skipped += 1;
                continue;
            }

            let credentials = match self.deps.credentials.load(&id) {
                Ok(credentials) => credentials,
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "unreadable credential snapshot, resuming without it");
                    None
                }
            };

            let message_callback_url = record
                .message_callback_url
                .filter(|url| !url.trim().is_empty());
            self.start(SessionSeed {
                id: id.clone(),
                callback_url: record.callback_url,
                relay_messages: record.relay_messages && message_callback_url.is_some(),
                message_callback_url,
                attempt_local_resume: true,
                credentials,
            });
            TraceEvent::SessionCreated {
                session_id: id.clone(),
                resume: true,
            }
            .emit();
            report.recovered += 1;
        }
        self.op_locks.prune_idle();

        tracing::info!(
            recovered = report.recovered,
            skipped = report.skipped,
            "session recovery complete"
        );
        TraceEvent::SessionsRecovered {
            recovered: report.recovered,
            skipped: report.skipped,
        }
        .emit();
        Ok(report)
    }

    /// Stop every actor and wait for them. Durable state is kept so the next
    /// start can resume.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<SessionHandle> = self.sessions.write().drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.join().await;
        }
        tracing::info!(sessions = handles.len(), "session registry drained");
    }

    fn start(&self, seed: SessionSeed) -> SessionHandle {
        let id = seed.id.clone();
        let handle = session::spawn(seed, self.deps.clone(), self.shutdown.child_token());
        self.sessions.write().insert(id, handle.clone());
        handle
    }
}
