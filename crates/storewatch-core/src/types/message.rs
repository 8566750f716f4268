//! Chat message types exchanged with a channel.

use serde::{Deserialize, Serialize};

/// Incoming message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub channel_id: String,
    pub author_id: String,
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_is_bot: bool,
    pub content: String,
    pub guild_id: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl IncomingMessage {
    /// Strip the command prefix, returning the command word and its remainder.
    pub fn command<'a>(&'a self, prefix: &str) -> Option<(&'a str, &'a str)> {
        let rest = self.content.trim().strip_prefix(prefix)?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().filter(|n| !n.is_empty())?;
        Some((name, parts.next().unwrap_or("").trim()))
    }
}

/// Outgoing plain-text message to a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub channel_id: String,
    pub content: String,
}

impl OutgoingMessage {
    pub fn new(channel_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { channel_id: channel_id.into(), content: content.into() }
    }
}
