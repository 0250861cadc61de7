use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use sr_domain::status::{MessageStatus, SessionStatus};
use sr_transport::TransportClient;

use super::{SessionCommand, SessionView, ToggleOutcome};
use crate::runtime::error::SessionError;

/// Cheap, cloneable reference to a running session actor.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    id: String,
    tx: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
    /// Set while a delete is in flight; lookups treat the session as gone.
    deleted: Arc<AtomicBool>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionHandle {
    pub(crate) fn new(
        id: String,
        tx: mpsc::Sender<SessionCommand>,
        view: watch::Receiver<SessionView>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            tx,
            view,
            deleted: Arc::new(AtomicBool::new(false)),
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.view.borrow().status
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    pub async fn toggle_relay_messages(&self) -> Result<ToggleOutcome, SessionError> {
        self.request(|reply| SessionCommand::ToggleRelayMessages { reply })
            .await
    }

    pub async fn toggle_relay_media(&self) -> Result<ToggleOutcome, SessionError> {
        self.request(|reply| SessionCommand::ToggleRelayMedia { reply })
            .await
    }

    pub async fn set_message_callback_url(&self, url: String) -> Result<MessageStatus, SessionError> {
        self.request(|reply| SessionCommand::SetMessageCallbackUrl { url, reply })
            .await
    }

    /// The transport client, or `NotReady` unless the session is `ready`.
    pub async fn ready_client(&self) -> Result<Arc<dyn TransportClient>, SessionError> {
        self.request(|reply| SessionCommand::Client { reply }).await
    }

    /// Stop the actor and wait for it to exit. With `destroy_transport`, the
    /// transport session is destroyed first and its outcome returned.
    pub async fn teardown(&self, destroy_transport: bool) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        let sent = self
            .tx
            .send(SessionCommand::Teardown {
                destroy_transport,
                reply,
            })
            .await;
        let result = match sent {
            Ok(()) => match rx.await {
                Ok(result) => result.map_err(SessionError::from),
                Err(_) => Err(self.gone()),
            },
            // Actor already stopped; nothing left to tear down.
            Err(_) => Ok(()),
        };
        self.join().await;
        result
    }

    /// Wait until the published view satisfies `pred`.
    pub async fn wait_for(&self, pred: impl FnMut(&SessionView) -> bool) -> Option<SessionView> {
        let mut rx = self.view.clone();
        let view = rx.wait_for(pred).await.ok().map(|v| v.clone());
        view
    }

    pub(crate) async fn join(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(session_id = %self.id, error = %e, "session actor ended abnormally");
            }
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, SessionError>>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| self.gone())?;
        rx.await.map_err(|_| self.gone())?
    }

    fn gone(&self) -> SessionError {
        SessionError::Shutdown(self.id.clone())
    }
}
