//! Outbound sends, single and paced multi-recipient.

use std::time::Duration;

use serde::Serialize;

use sr_transport::{OutgoingContent, TransportClient};

/// `"923001234567"` -> `"923001234567@c.us"`. Addresses that already carry a
/// domain part pass through.
pub fn direct_address(phone: &str, suffix: &str) -> String {
    let phone = phone.trim();
    if phone.contains('@') {
        phone.to_owned()
    } else {
        format!("{phone}{suffix}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub sent: usize,
    pub failed: usize,
}

/// Send `content` to every recipient in order, pausing `pacing` between
/// consecutive sends. A failed recipient is logged and skipped.
pub async fn send_paced(
    client: &dyn TransportClient,
    recipients: &[String],
    content: &OutgoingContent,
    pacing: Duration,
) -> SendReport {
    let mut report = SendReport::default();
    for (i, to) in recipients.iter().enumerate() {
        if i > 0 && !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
        match client.send(to, content.clone()).await {
            Ok(()) => {
                tracing::debug!(to = %to, "message sent");
                report.sent += 1;
            }
            Err(e) => {
                tracing::warn!(to = %to, error = %e, "send failed, continuing with next recipient");
                report.failed += 1;
            }
        }
    }
    report
}
