//! Paced, strictly sequential delivery of a cycle's notifications.

use std::sync::Arc;
use std::time::Duration;

use storewatch_core::error::{Result, WatchError};
use storewatch_core::traits::Channel;
use storewatch_core::types::Notification;

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Keys delivered, in send order.
    pub sent: Vec<String>,
    /// Keys whose send failed transiently, with the error text.
    pub failed: Vec<(String, String)>,
    /// Set when the destination disappeared mid-batch; the rest was dropped.
    pub aborted: Option<String>,
}

pub struct Dispatcher {
    channel: Arc<dyn Channel>,
    pacing: Duration,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn Channel>, pacing: Duration) -> Self {
        Self { channel, pacing }
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Send a single notification after checking the destination.
    pub async fn send(&self, destination: &str, notification: &Notification) -> Result<()> {
        self.channel.resolve_destination(destination).await?;
        self.channel.send_notification(destination, notification).await
    }

    /// Deliver `batch` in order, waiting the pacing interval between sends.
    ///
    /// The destination is resolved once up front; if it is unavailable the
    /// call fails before anything is sent. Transient per-message failures
    /// are recorded and the batch carries on. Anything else (the destination
    /// vanishing, the bot losing access) stops the batch.
    pub async fn dispatch(&self, destination: &str, batch: &[(String, Notification)]) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();
        if batch.is_empty() {
            return Ok(report);
        }

        if !self.channel.is_connected() {
            return Err(WatchError::unavailable(format!("{} channel is not connected", self.channel.name())));
        }
        self.channel.resolve_destination(destination).await?;

        for (i, (key, notification)) in batch.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing).await;
            }

            match self.channel.send_notification(destination, notification).await {
                Ok(()) => {
                    tracing::info!("Notified new record: {key}");
                    report.sent.push(key.clone());
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!("Failed to notify {key}: {e}");
                    report.failed.push((key.clone(), e.to_string()));
                }
                Err(e) => {
                    tracing::error!(
                        "Delivery to {destination} stopped, dropping {} pending notifications: {e}",
                        batch.len() - i
                    );
                    report.aborted = Some(e.to_string());
                    break;
                }
            }
        }

        Ok(report)
    }
}
