//! # StoreWatch Core
//! Data model, error taxonomy, configuration and the change-detection core
//! shared by every StoreWatch crate.

pub mod config;
pub mod detector;
pub mod error;
pub mod render;
pub mod traits;
pub mod types;

pub use config::WatchConfig;
pub use detector::ChangeDetector;
pub use error::{Result, WatchError};
pub use render::NotificationRenderer;
