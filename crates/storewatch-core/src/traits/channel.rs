//! Messaging channel trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Notification, OutgoingMessage};

/// A chat platform able to deliver notifications to a destination.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    async fn connect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Check that `destination` exists and accepts sends.
    ///
    /// Fails with `WatchError::DestinationUnavailable` otherwise. Callers
    /// resolve once per cycle and never cache the answer.
    async fn resolve_destination(&self, destination: &str) -> Result<()>;

    async fn send_notification(&self, destination: &str, notification: &Notification) -> Result<()>;

    async fn send(&self, message: OutgoingMessage) -> Result<()>;
}
