//! Message ingestion: turns inbound messages into relay payloads.
//!
//! With media relay on, a media message becomes the reduced
//! `{sessionId, body, mediaUrl}` payload after its media is stored. Every
//! other message becomes the full metadata payload with `mediaUrl: null`.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use serde_json::{json, Value};

use sr_domain::config::MessagesConfig;
use sr_domain::error::Error;
use sr_domain::trace::TraceEvent;
use sr_sessions::MediaStore;
use sr_transport::{ChatSummary, InboundMessage, TransportClient};

const UTC_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const LOCAL_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

pub struct MessageIngestionPipeline {
    media: Arc<MediaStore>,
    media_mount: String,
    direct_suffix: String,
    group_suffix: String,
    /// `None` formats local timestamps in the host zone.
    timezone: Option<Tz>,
}

impl MessageIngestionPipeline {
    pub fn new(media: Arc<MediaStore>, config: &MessagesConfig) -> Result<Self, Error> {
        let timezone = config
            .timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|e| Error::Config(format!("unknown timezone {name:?}: {e}")))
            })
            .transpose()?;
        Ok(Self {
            media,
            media_mount: config.media_mount.trim_end_matches('/').to_owned(),
            direct_suffix: config.direct_suffix.clone(),
            group_suffix: config.group_suffix.clone(),
            timezone,
        })
    }

    /// Public URL path of a stored media file.
    pub fn media_url(&self, filename: &str) -> String {
        format!("{}/{filename}", self.media_mount)
    }

    /// Build the relay payload for one inbound message.
    ///
    /// `None` means nothing is forwarded: the media branch was taken but the
    /// download failed or produced nothing.
    pub async fn relay_payload(
        &self,
        session_id: &str,
        client: &dyn TransportClient,
        message: &InboundMessage,
        relay_media: bool,
    ) -> Option<Value> {
        if message.has_media && relay_media {
            let filename = self.fetch_media(session_id, client, message).await?;
            return Some(json!({
                "sessionId": session_id,
                "body": message.body,
                "mediaUrl": self.media_url(&filename),
            }));
        }
        Some(self.metadata_payload(session_id, message, None))
    }

    /// Download and store the media of `message`. Failures are logged.
    pub async fn fetch_media(
        &self,
        session_id: &str,
        client: &dyn TransportClient,
        message: &InboundMessage,
    ) -> Option<String> {
        let blob = match client.download_media(&message.id).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                tracing::info!(session_id = %session_id, message_id = %message.id, "message has no downloadable media");
                return None;
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, message_id = %message.id, error = %e, "media download failed");
                return None;
            }
        };

        match self.media.store(&message.id, &blob.mimetype, &blob.data).await {
            Ok(filename) => {
                TraceEvent::MediaStored {
                    session_id: session_id.to_owned(),
                    filename: filename.clone(),
                    bytes: blob.data.len(),
                }
                .emit();
                Some(filename)
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, message_id = %message.id, error = %e, "storing media failed");
                None
            }
        }
    }

    /// Full metadata view of a message.
    pub fn metadata_payload(
        &self,
        session_id: &str,
        message: &InboundMessage,
        media_url: Option<String>,
    ) -> Value {
        let (utc, local) = self.format_timestamp(message.timestamp);
        let is_private = message.from.ends_with(&self.direct_suffix)
            || message.to.ends_with(&self.direct_suffix);
        let is_group = message.from.ends_with(&self.group_suffix)
            || message.to.ends_with(&self.group_suffix);

        json!({
            "messageId": message.id,
            "sessionId": session_id,
            "body": message.body,
            "mediaUrl": media_url,
            "fromMe": message.from_me,
            "isReply": message.is_reply,
            "hasMedia": message.has_media,
            "from": local_part(&message.from),
            "to": local_part(&message.to),
            "timestamp": message.timestamp,
            "timestampUTC": utc,
            "timestampLocal": local,
            "isPrivateMessage": is_private,
            "isGroupMessage": is_group,
            "isStatus": message.is_status,
        })
    }

    /// Compact listing entry used by the plain message fetch.
    pub fn listing_entry(&self, message: &InboundMessage) -> Value {
        json!({
            "id": message.id,
            "body": message.body,
            "from": message.from,
            "timestamp": message.timestamp,
            "hasMedia": message.has_media,
            "mediaUrl": Value::Null,
        })
    }

    pub fn chat_summary(&self, chat: &ChatSummary) -> Value {
        let last = chat.last_message.as_ref().map(|m| {
            let (utc, local) = self.format_timestamp(m.timestamp);
            json!({
                "messageId": m.id,
                "body": m.body,
                "fromMe": m.from_me,
                "hasMedia": m.has_media,
                "from": m.from,
                "to": m.to,
                "timestamp": m.timestamp,
                "timestampUTC": utc,
                "timestampLocal": local,
            })
        });
        json!({
            "id": chat.id,
            "name": chat.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Unnamed Chat"),
            "isGroup": chat.is_group,
            "lastMessageData": last,
        })
    }

    fn format_timestamp(&self, ts: i64) -> (String, String) {
        let Some(utc) = DateTime::<Utc>::from_timestamp(ts, 0) else {
            return (String::new(), String::new());
        };
        let local = match self.timezone {
            Some(tz) => utc.with_timezone(&tz).format(LOCAL_FORMAT).to_string(),
            None => utc.with_timezone(&Local).format(LOCAL_FORMAT).to_string(),
        };
        (utc.format(UTC_FORMAT).to_string(), local)
    }
}

/// `"123@c.us"` -> `"123"`.
fn local_part(address: &str) -> &str {
    address.split('@').next().unwrap_or(address)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use sr_transport::mock::{MockBehavior, MockTransport};
    use sr_transport::{MediaBlob, SessionOptions, TransportFactory};

    fn pipeline(dir: &std::path::Path, tz: Option<&str>) -> MessageIngestionPipeline {
        let media = Arc::new(MediaStore::new(&dir.join("media")).unwrap());
        let config = MessagesConfig {
            timezone: tz.map(str::to_owned),
            ..Default::default()
        };
        MessageIngestionPipeline::new(media, &config).unwrap()
    }

    fn message(id: &str, has_media: bool) -> InboundMessage {
        InboundMessage {
            id: id.into(),
            body: "hello".into(),
            from: "923001234567@c.us".into(),
            to: "120363@g.us".into(),
            from_me: false,
            is_reply: true,
            has_media,
            timestamp: 1_700_000_000,
            is_status: false,
        }
    }

    async fn client_with_media(media: Vec<(&str, MediaBlob)>) -> std::sync::Arc<dyn TransportClient> {
        let mut behavior = MockBehavior::default();
        for (id, blob) in media {
            behavior.media.insert(id.into(), blob);
        }
        let transport = MockTransport::with_behavior(behavior);
        transport
            .open(SessionOptions {
                session_id: "t1".into(),
                resume: false,
                credentials: None,
            })
            .await
            .unwrap()
            .client
    }

    #[test]
    fn metadata_payload_shape() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path(), Some("UTC"));
        let payload = p.metadata_payload("t1", &message("m1", false), None);

        assert_eq!(payload["messageId"], "m1");
        assert_eq!(payload["sessionId"], "t1");
        assert_eq!(payload["mediaUrl"], Value::Null);
        assert_eq!(payload["from"], "923001234567");
        assert_eq!(payload["to"], "120363");
        assert_eq!(payload["isReply"], true);
        assert_eq!(payload["isPrivateMessage"], true);
        assert_eq!(payload["isGroupMessage"], true);
        assert_eq!(payload["isStatus"], false);
        assert_eq!(payload["timestamp"], 1_700_000_000);
        assert_eq!(payload["timestampUTC"], "Tue, 14 Nov 2023 22:13:20 GMT");
        assert_eq!(payload["timestampLocal"], "11/14/2023, 10:13:20 PM");
    }

    #[test]
    fn local_timestamp_follows_configured_zone() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path(), Some("Asia/Karachi"));
        let payload = p.metadata_payload("t1", &message("m1", false), None);
        assert_eq!(payload["timestampLocal"], "11/15/2023, 3:13:20 AM");
    }

    #[test]
    fn unknown_timezone_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let media = Arc::new(MediaStore::new(dir.path()).unwrap());
        let config = MessagesConfig {
            timezone: Some("Mars/Olympus".into()),
            ..Default::default()
        };
        assert!(matches!(
            MessageIngestionPipeline::new(media, &config),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn media_message_without_media_relay_gets_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path(), Some("UTC"));
        let client = client_with_media(vec![]).await;

        let payload = p
            .relay_payload("t1", client.as_ref(), &message("m1", true), false)
            .await
            .unwrap();
        assert_eq!(payload["hasMedia"], true);
        assert_eq!(payload["mediaUrl"], Value::Null);
        assert!(payload.get("messageId").is_some());
    }

    #[tokio::test]
    async fn media_relay_stores_file_and_sends_reduced_payload() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path(), Some("UTC"));
        let client = client_with_media(vec![(
            "m1",
            MediaBlob {
                mimetype: "image/jpeg".into(),
                data: vec![1, 2, 3],
                filename: None,
            },
        )])
        .await;

        let payload = p
            .relay_payload("t1", client.as_ref(), &message("m1", true), true)
            .await
            .unwrap();
        assert_eq!(
            payload,
            json!({ "sessionId": "t1", "body": "hello", "mediaUrl": "/media/m1.jpeg" })
        );
        assert_eq!(
            std::fs::read(dir.path().join("media").join("m1.jpeg")).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn missing_media_forwards_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path(), Some("UTC"));
        let client = client_with_media(vec![]).await;

        let payload = p
            .relay_payload("t1", client.as_ref(), &message("m1", true), true)
            .await;
        assert!(payload.is_none());
    }

    #[test]
    fn chat_summary_defaults_name() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path(), Some("UTC"));
        let chat = ChatSummary {
            id: "120363@g.us".into(),
            name: None,
            is_group: true,
            last_message: Some(message("m9", false)),
        };
        let summary = p.chat_summary(&chat);
        assert_eq!(summary["name"], "Unnamed Chat");
        assert_eq!(summary["isGroup"], true);
        assert_eq!(summary["lastMessageData"]["messageId"], "m9");
        assert_eq!(summary["lastMessageData"]["from"], "923001234567@c.us");

        let bare = p.chat_summary(&ChatSummary {
            id: "1@c.us".into(),
            name: Some("Alice".into()),
            is_group: false,
            last_message: None,
        });
        assert_eq!(bare["name"], "Alice");
        assert_eq!(bare["lastMessageData"], Value::Null);
    }
}
