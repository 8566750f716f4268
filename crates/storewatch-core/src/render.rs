//! Turns a (key, record) pair into a presentable notification.

use std::borrow::Cow;

use crate::config::NotifyConfig;
use crate::error::{Result, WatchError};
use crate::types::{Notification, Record};

pub const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone)]
pub struct NotificationRenderer {
    title: String,
    color: u32,
    description_limit: usize,
}

impl NotificationRenderer {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            title: config.title.clone(),
            color: config.color,
            description_limit: config.description_limit,
        }
    }

    /// Render one new record. A malformed record or one without a display
    /// name is an error, never a blank field.
    pub fn render(&self, key: &str, record: &Record) -> Result<Notification> {
        if let Some(reason) = &record.malformed {
            return Err(WatchError::render(key, format!("malformed record: {reason}")));
        }
        let name = record
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| WatchError::render(key, "missing display name"))?;

        let mut body = format!("**{name}**");
        if let Some(description) = record.description.as_deref().filter(|d| !d.trim().is_empty()) {
            body.push('\n');
            body.push_str(&truncate(description, self.description_limit));
        }

        Ok(Notification {
            title: self.title.clone(),
            body,
            image: record.image.clone().filter(|i| !i.trim().is_empty()),
            footer: format!("id: {key}"),
            color: self.color,
        })
    }
}

impl Default for NotificationRenderer {
    fn default() -> Self {
        Self::new(&NotifyConfig::default())
    }
}

/// Cut `text` to `limit` characters, appending the marker when anything was cut.
pub fn truncate(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &text[..cut])),
    }
}
