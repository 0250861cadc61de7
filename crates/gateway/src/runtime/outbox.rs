//! Per-session side-effect queue.
//!
//! Webhook notifications and message ingestion run off the session actor so
//! a slow receiver never stalls state handling. Jobs of one session are
//! processed strictly in submission order. The queue is bounded and a full
//! queue drops new jobs rather than blocking the actor.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sr_transport::{InboundMessage, TransportClient};

use super::ingest::MessageIngestionPipeline;
use super::webhook::WebhookSink;

/// Queued jobs per session before new ones are dropped.
pub const OUTBOX_CAPACITY: usize = 256;

/// How long an exiting session waits for queued jobs.
pub const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

pub enum OutboxJob {
    Notify {
        url: String,
        payload: Value,
    },
    Ingest {
        url: String,
        client: Arc<dyn TransportClient>,
        message: InboundMessage,
        relay_media: bool,
    },
}

pub struct Outbox {
    session_id: String,
    tx: mpsc::Sender<OutboxJob>,
    worker: JoinHandle<()>,
    stop_ingest: CancellationToken,
}

impl Outbox {
    pub fn spawn(
        session_id: String,
        sink: Arc<dyn WebhookSink>,
        pipeline: Arc<MessageIngestionPipeline>,
    ) -> Self {
        Self::with_capacity(session_id, sink, pipeline, OUTBOX_CAPACITY)
    }

    pub fn with_capacity(
        session_id: String,
        sink: Arc<dyn WebhookSink>,
        pipeline: Arc<MessageIngestionPipeline>,
        capacity: usize,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<OutboxJob>(capacity.max(1));
        let stop_ingest = CancellationToken::new();
        let stopped = stop_ingest.clone();
        let id = session_id.clone();

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    OutboxJob::Notify { url, payload } => sink.notify(&url, &payload).await,
                    OutboxJob::Ingest { .. } if stopped.is_cancelled() => {}
                    OutboxJob::Ingest {
                        url,
                        client,
                        message,
                        relay_media,
                    } => {
                        let payload = tokio::select! {
                            biased;
                            _ = stopped.cancelled() => None,
                            payload = pipeline.relay_payload(&id, client.as_ref(), &message, relay_media) => payload,
                        };
                        if let Some(payload) = payload {
                            sink.notify(&url, &payload).await;
                        }
                    }
                }
            }
            tracing::debug!(session_id = %id, "outbox drained");
        });

        Self {
            session_id,
            tx,
            worker,
            stop_ingest,
        }
    }

    /// Queue `job`. Returns `false` when it was dropped.
    pub fn push(&self, job: OutboxJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(session_id = %self.session_id, "outbox full, job dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(session_id = %self.session_id, "outbox worker gone, job dropped");
                false
            }
        }
    }

    /// Skip queued and in-flight ingestion. Called before the transport
    /// client is destroyed.
    pub fn stop_ingest(&self) {
        self.stop_ingest.cancel();
    }

    /// Stop accepting jobs and wait up to `deadline` for queued ones; whatever
    /// is left after that is dropped.
    pub async fn close(self, deadline: Duration) {
        drop(self.tx);
        let mut worker = self.worker;
        if tokio::time::timeout(deadline, &mut worker).await.is_err() {
            worker.abort();
            tracing::warn!(
                session_id = %self.session_id,
                deadline_secs = deadline.as_secs(),
                "outbox drain deadline passed, pending jobs dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use sr_domain::config::MessagesConfig;
    use sr_sessions::MediaStore;

    /// Records each url, then takes `delay` to "deliver".
    struct SlowSink {
        delay: Duration,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WebhookSink for SlowSink {
        async fn notify(&self, url: &str, _payload: &Value) {
            self.seen.lock().push(url.to_owned());
            tokio::time::sleep(self.delay).await;
        }
    }

    fn outbox(dir: &std::path::Path, sink: Arc<SlowSink>, capacity: usize) -> Outbox {
        let media = Arc::new(MediaStore::new(dir).unwrap());
        let pipeline = Arc::new(MessageIngestionPipeline::new(media, &MessagesConfig::default()).unwrap());
        Outbox::with_capacity("s1".into(), sink, pipeline, capacity)
    }

    fn notify(url: &str) -> OutboxJob {
        OutboxJob::Notify {
            url: url.into(),
            payload: json!({}),
        }
    }

    #[tokio::test]
    async fn full_queue_drops_new_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(SlowSink {
            delay: Duration::from_secs(3600),
            seen: Mutex::new(Vec::new()),
        });
        let outbox = outbox(dir.path(), sink, 2);

        // The worker has not run yet, so nothing leaves the queue.
        assert!(outbox.push(notify("http://a")));
        assert!(outbox.push(notify("http://b")));
        assert!(!outbox.push(notify("http://c")));
    }

    #[tokio::test(start_paused = true)]
    async fn close_gives_up_after_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(SlowSink {
            delay: Duration::from_secs(30),
            seen: Mutex::new(Vec::new()),
        });
        let outbox = outbox(dir.path(), sink.clone(), 16);
        for n in 0..10 {
            outbox.push(notify(&format!("http://hook/{n}")));
        }

        let started = tokio::time::Instant::now();
        outbox.close(Duration::from_secs(5)).await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6), "{elapsed:?}");
        assert_eq!(sink.seen.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_waits_for_fast_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(SlowSink {
            delay: Duration::from_millis(10),
            seen: Mutex::new(Vec::new()),
        });
        let outbox = outbox(dir.path(), sink.clone(), 16);
        for n in 0..5 {
            outbox.push(notify(&format!("http://hook/{n}")));
        }
        outbox.close(DRAIN_DEADLINE).await;
        assert_eq!(sink.seen.lock().len(), 5);
    }
}
