//! Unified error types for StoreWatch.

use thiserror::Error;

/// Result type alias using WatchError.
pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Error, Debug)]
pub enum WatchError {
    // Record store errors
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Store returned an empty snapshot")]
    EmptySnapshot,

    // Rendering errors
    #[error("Render error for record '{key}': {reason}")]
    Render { key: String, reason: String },

    // Channel errors
    #[error("Destination unavailable: {0}")]
    DestinationUnavailable(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    // Command errors
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl WatchError {
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn render(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Render { key: key.into(), reason: reason.into() }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::DestinationUnavailable(msg.into())
    }

    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Per-message send failures that leave the destination usable.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Dispatch(_) | Self::RateLimited(_) | Self::Http(_) | Self::Timeout(_)
        )
    }
}
