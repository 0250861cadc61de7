use std::future::pending;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use sr_domain::status::{MessageStatus, SessionStatus};
use sr_domain::trace::TraceEvent;
use sr_transport::{
    SessionOptions, TransportClient, TransportError, TransportEvent, TransportSession,
};

use super::handle::SessionHandle;
use super::{SessionCommand, SessionDeps, SessionSeed, SessionView, ToggleOutcome};
use crate::runtime::error::SessionError;
use crate::runtime::outbox::{Outbox, OutboxJob, DRAIN_DEADLINE};

/// Outcome of one bring-up step run off the actor loop.
enum BringUp {
    Opened(Result<TransportSession, TransportError>),
    Initialized(Result<(), TransportError>),
}

type BringUpTask = JoinHandle<BringUp>;

/// Start the actor for `seed` and return a handle to it.
///
/// Bring-up begins immediately. The actor stops when `shutdown` fires, when
/// it is torn down, or when every handle is gone.
pub fn spawn(seed: SessionSeed, deps: SessionDeps, shutdown: CancellationToken) -> SessionHandle {
    let view = SessionView::new(&seed);
    let (view_tx, view_rx) = watch::channel(view.clone());
    let (tx, commands) = mpsc::channel(deps.command_buffer.max(1));
    let outbox = Outbox::spawn(seed.id.clone(), deps.sink.clone(), deps.pipeline.clone());

    let actor = SessionActor {
        view,
        view_tx,
        commands,
        shutdown,
        deps,
        outbox: Some(outbox),
        credentials: seed.credentials,
        client: None,
        events: None,
        init_task: None,
        retry_at: None,
    };
    let task = tokio::spawn(actor.run());
    SessionHandle::new(seed.id, tx, view_rx, task)
}

struct SessionActor {
    view: SessionView,
    view_tx: watch::Sender<SessionView>,
    commands: mpsc::Receiver<SessionCommand>,
    shutdown: CancellationToken,
    deps: SessionDeps,
    /// Taken on exit so queued jobs can drain.
    outbox: Option<Outbox>,
    credentials: Option<serde_json::Value>,
    client: Option<Arc<dyn TransportClient>>,
    events: Option<mpsc::Receiver<TransportEvent>>,
    /// In-flight `open` or `initialize`.
    init_task: Option<BringUpTask>,
    /// Pending bring-up retry.
    retry_at: Option<Instant>,
}

impl SessionActor {
    async fn run(mut self) {
        tracing::debug!(session_id = %self.view.id, resume = self.view.attempt_local_resume, "session actor started");
        self.begin_attempt();

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    tracing::debug!(session_id = %self.view.id, "session actor received shutdown");
                    break;
                }

                step = join_init(&mut self.init_task) => self.on_bring_up(step),

                event = next_event(&mut self.events) => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        self.events = None;
                        if !self.view.status.is_terminal() {
                            self.transition(
                                SessionStatus::Disconnected,
                                format!("{} disconnected! Reason: event stream closed", self.view.id),
                                None,
                            );
                        }
                    }
                },

                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd).await {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!(session_id = %self.view.id, "all handles dropped");
                        break;
                    }
                },

                _ = sleep_until_opt(self.retry_at) => {
                    self.retry_at = None;
                    self.begin_attempt();
                }
            }
        }

        if let Some(task) = self.init_task.take() {
            task.abort();
        }
        if let Some(outbox) = self.outbox.take() {
            outbox.close(DRAIN_DEADLINE).await;
        }
        tracing::debug!(session_id = %self.view.id, status = %self.view.status, "session actor stopped");
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Bring-up
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Start the next bring-up step: open the transport session when there
    /// is none yet, otherwise initialize it.
    fn begin_attempt(&mut self) {
        if self.view.status.is_terminal() {
            return;
        }
        match self.client.clone() {
            Some(client) => {
                self.init_task = Some(tokio::spawn(async move {
                    BringUp::Initialized(client.initialize().await)
                }));
            }
            None => {
                let factory = self.deps.factory.clone();
                let options = SessionOptions {
                    session_id: self.view.id.clone(),
                    resume: self.view.attempt_local_resume,
                    credentials: self.credentials.clone(),
                };
                self.init_task = Some(tokio::spawn(async move {
                    BringUp::Opened(factory.open(options).await)
                }));
            }
        }
    }

    fn on_bring_up(&mut self, step: BringUp) {
        match step {
            BringUp::Opened(Ok(session)) => {
                tracing::debug!(session_id = %self.view.id, "transport session opened");
                self.client = Some(session.client);
                self.events = Some(session.events);
                self.begin_attempt();
            }
            BringUp::Opened(Err(e)) | BringUp::Initialized(Err(e)) => {
                self.on_initialize_finished(Err(e));
            }
            BringUp::Initialized(Ok(())) => self.on_initialize_finished(Ok(())),
        }
    }

    fn on_initialize_finished(&mut self, result: Result<(), TransportError>) {
        match result {
            Ok(()) => {
                tracing::info!(session_id = %self.view.id, "transport initialized");
                self.view.reconnect_attempts = 0;
                if self.view.status == SessionStatus::Pending {
                    self.transition(
                        SessionStatus::Initialized,
                        format!("{} has been initialized successfully.", self.view.id),
                        None,
                    );
                } else {
                    self.publish();
                }
            }
            Err(e) if self.view.status == SessionStatus::Pending => {
                let policy = self.deps.policy.clone();
                if policy.should_give_up(self.view.reconnect_attempts) {
                    tracing::error!(
                        session_id = %self.view.id,
                        attempts = self.view.reconnect_attempts,
                        error = %e,
                        "bring-up retries exhausted"
                    );
                    self.transition(
                        SessionStatus::ReconnectionFailed,
                        format!("{} failed to reconnect after multiple attempts.", self.view.id),
                        None,
                    );
                    return;
                }

                let attempt = self.view.reconnect_attempts + 1;
                let delay = policy.delay_for_attempt(attempt);
                let Some(at) = Instant::now().checked_add(delay) else {
                    tracing::error!(session_id = %self.view.id, attempt, "retry delay out of range, giving up");
                    self.transition(
                        SessionStatus::ReconnectionFailed,
                        format!("{} failed to reconnect after multiple attempts.", self.view.id),
                        None,
                    );
                    return;
                };
                self.view.reconnect_attempts = attempt;
                self.retry_at = Some(at);
                tracing::warn!(
                    session_id = %self.view.id,
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "initialize failed, retry scheduled"
                );
                TraceEvent::ReconnectScheduled {
                    session_id: self.view.id.clone(),
                    attempt,
                    delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                }
                .emit();
                self.publish();
            }
            Err(e) => {
                // Bring-up already moved on through the event stream.
                tracing::warn!(session_id = %self.view.id, status = %self.view.status, error = %e, "late initialize failure ignored");
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Transport events
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn handle_event(&mut self, event: TransportEvent) {
        let id = self.view.id.clone();
        match event {
            TransportEvent::PairingRequired { token } => {
                if self.view.attempt_local_resume {
                    self.transition(
                        SessionStatus::NeedDelete,
                        format!("{id} has a problem and need delete"),
                        None,
                    );
                } else {
                    tracing::info!(session_id = %id, "pairing required");
                    self.transition(
                        SessionStatus::NeedRegister,
                        format!("{id} need register"),
                        Some(token),
                    );
                }
            }
            TransportEvent::Ready => {
                if self.view.status == SessionStatus::Pending {
                    self.transition(
                        SessionStatus::Initialized,
                        format!("{id} has been initialized successfully."),
                        None,
                    );
                }
                if self.transition(SessionStatus::Ready, format!("{id} is ready!"), None) {
                    self.persist_credentials().await;
                }
            }
            TransportEvent::Disconnected { reason } => {
                self.transition(
                    SessionStatus::Disconnected,
                    format!("{id} disconnected! Reason: {reason}"),
                    None,
                );
            }
            TransportEvent::AuthFailure { message } => {
                self.transition(
                    SessionStatus::AuthFailure,
                    format!("{id} encountered an auth failure: {message}"),
                    None,
                );
            }
            TransportEvent::Message(message) => {
                if !self.view.relay_messages {
                    return;
                }
                let (Some(url), Some(client)) =
                    (self.view.message_callback_url.clone(), self.client.clone())
                else {
                    return;
                };
                tracing::debug!(session_id = %id, message_id = %message.id, "relaying message");
                self.push(OutboxJob::Ingest {
                    url,
                    client,
                    message,
                    relay_media: self.view.relay_media,
                });
            }
        }
    }

    async fn persist_credentials(&mut self) {
        let Some(client) = self.client.clone() else {
            return;
        };
        match client.credential_snapshot().await {
            Ok(Some(snapshot)) => match self.deps.credentials.save(&self.view.id, &snapshot) {
                Ok(()) => {
                    tracing::debug!(session_id = %self.view.id, "credential snapshot saved");
                    self.credentials = Some(snapshot);
                }
                Err(e) => {
                    tracing::warn!(session_id = %self.view.id, error = %e, "saving credential snapshot failed");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(session_id = %self.view.id, error = %e, "credential snapshot unavailable");
            }
        }
    }

    /// Apply a lifecycle edge. Illegal edges are ignored and return `false`.
    fn transition(
        &mut self,
        next: SessionStatus,
        message: String,
        pairing_token: Option<String>,
    ) -> bool {
        let from = self.view.status;
        if !from.can_transition_to(next) {
            tracing::debug!(session_id = %self.view.id, %from, to = %next, "ignoring illegal transition");
            return false;
        }

        self.view.status = next;
        if next.unlocks_actions() {
            self.view.ready_for_action = true;
        }
        if next.is_terminal() {
            self.retry_at = None;
            if let Some(task) = self.init_task.take() {
                task.abort();
            }
        }

        tracing::info!(session_id = %self.view.id, %from, to = %next, "session status changed");
        TraceEvent::SessionStatusChanged {
            session_id: self.view.id.clone(),
            from: from.to_string(),
            to: next.to_string(),
        }
        .emit();

        self.notify_lifecycle(message, pairing_token);
        self.publish();
        true
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Commands
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Returns `true` when the actor should stop.
    async fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::ToggleRelayMessages { reply } => {
                let _ = reply.send(self.toggle_relay_messages());
            }
            SessionCommand::ToggleRelayMedia { reply } => {
                let previous = self.view.relay_media;
                self.view.relay_media = !previous;
                let outcome = self.toggled(previous, self.view.relay_media, "media relay");
                let _ = reply.send(Ok(outcome));
            }
            SessionCommand::SetMessageCallbackUrl { url, reply } => {
                let _ = reply.send(self.set_message_callback_url(url));
            }
            SessionCommand::Client { reply } => {
                let result = match (&self.client, self.view.status) {
                    (Some(client), SessionStatus::Ready) => Ok(client.clone()),
                    _ => Err(SessionError::NotReady(self.view.id.clone())),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Teardown {
                destroy_transport,
                reply,
            } => {
                if let Some(outbox) = &self.outbox {
                    outbox.stop_ingest();
                }
                let result = self.teardown(destroy_transport).await;
                let _ = reply.send(result);
                return true;
            }
        }
        false
    }

    fn toggle_relay_messages(&mut self) -> Result<ToggleOutcome, SessionError> {
        let previous = self.view.relay_messages;
        let current = !previous;
        if current && self.view.message_callback_url.is_none() {
            return Err(SessionError::Validation(
                "messageCallbackUrl must be set before enabling message relay".into(),
            ));
        }
        self.deps
            .store
            .update(&self.view.id, |record| record.relay_messages = current)?;
        self.view.relay_messages = current;
        Ok(self.toggled(previous, current, "message relay"))
    }

    fn set_message_callback_url(&mut self, url: String) -> Result<MessageStatus, SessionError> {
        self.deps.store.update(&self.view.id, |record| {
            record.message_callback_url = Some(url.clone());
        })?;
        tracing::info!(session_id = %self.view.id, url = %url, "message callback url updated");
        self.view.message_callback_url = Some(url);
        self.publish();
        Ok(self.view.message_status())
    }

    fn toggled(&mut self, previous: bool, current: bool, what: &str) -> ToggleOutcome {
        tracing::info!(session_id = %self.view.id, previous, current, "{what} toggled");
        self.notify_lifecycle(
            format!("{} {what} updated from {previous} to {current}", self.view.id),
            None,
        );
        self.publish();
        ToggleOutcome {
            previous,
            current,
            message_status: self.view.message_status(),
        }
    }

    async fn teardown(&mut self, destroy_transport: bool) -> Result<(), TransportError> {
        self.retry_at = None;
        if let Some(task) = self.init_task.take() {
            task.abort();
        }
        match (&self.client, destroy_transport) {
            (Some(client), true) => client.destroy().await,
            _ => Ok(()),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Output
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn notify_lifecycle(&self, message: String, pairing_token: Option<String>) {
        let payload = json!({
            "message_status": self.view.message_status().as_str(),
            "sessionId": self.view.id,
            "status": self.view.status.as_str(),
            "message": message,
            "pairingToken": pairing_token,
        });
        self.push(OutboxJob::Notify {
            url: self.view.callback_url.clone(),
            payload,
        });
    }

    fn push(&self, job: OutboxJob) {
        if let Some(outbox) = &self.outbox {
            outbox.push(job);
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view.clone());
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<TransportEvent>>) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn join_init(task: &mut Option<BringUpTask>) -> BringUp {
    let Some(handle) = task.as_mut() else {
        return pending().await;
    };
    let step = match handle.await {
        Ok(step) => step,
        Err(e) => BringUp::Initialized(Err(TransportError::Protocol(format!(
            "bring-up task failed: {e}"
        )))),
    };
    *task = None;
    step
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => pending().await,
    }
}
