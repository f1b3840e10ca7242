//! Fire-and-forget hand-off to downstream post-processing.
//!
//! Completed video uploads are announced on a bounded channel; a drain task
//! owned by `main` consumes them. Enqueue failures are logged and swallowed,
//! never surfaced to the uploader, because by the time a notification exists
//! the upload itself has already durably succeeded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Job description handed to the post-processing pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingNotification {
    pub upload_id: String,
    pub object_key: String,
    pub filename: String,
    pub content_type: String,
    pub total_size: i64,
    pub file_url: String,
    pub owner_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Sending half of the notification channel.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<ProcessingNotification>,
}

impl Notifier {
    /// Build a notifier and the receiver its drain task will consume.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProcessingNotification>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue a notification without waiting. A full or closed channel drops
    /// the message with a warning.
    pub fn notify(&self, notification: ProcessingNotification) {
        if let Err(err) = self.tx.try_send(notification) {
            warn!("dropping post-processing notification: {}", err);
        }
    }
}

/// Consume queued notifications until the channel closes.
///
/// This is the seam where a real queue or webhook client would plug in; for
/// now accepted jobs are logged and forgotten.
pub async fn run_drain(mut rx: mpsc::Receiver<ProcessingNotification>) {
    while let Some(note) = rx.recv().await {
        info!(
            "queued video post-processing for {} (upload {})",
            note.object_key, note.upload_id
        );
    }
}
