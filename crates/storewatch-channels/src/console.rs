//! Console channel — prints notifications to stdout instead of posting them.

use async_trait::async_trait;
use storewatch_core::error::Result;
use storewatch_core::traits::Channel;
use storewatch_core::types::{Notification, OutgoingMessage};

#[derive(Debug, Default)]
pub struct ConsoleChannel {
    connected: bool,
}

impl ConsoleChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Plain-text rendering of a notification card.
pub fn format_notification(notification: &Notification) -> String {
    let mut out = format!("━━ {} ━━\n{}\n", notification.title, notification.body);
    if let Some(image) = &notification.image {
        out.push_str(&format!("🖼  {image}\n"));
    }
    out.push_str(&format!("— {}", notification.footer));
    out
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn name(&self) -> &str { "console" }

    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool { self.connected }

    async fn resolve_destination(&self, _destination: &str) -> Result<()> {
        Ok(())
    }

    async fn send_notification(&self, _destination: &str, notification: &Notification) -> Result<()> {
        println!("{}\n", format_notification(notification));
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        println!("{}", message.content);
        Ok(())
    }
}
