//! Shared data model.

pub mod message;
pub mod notification;
pub mod record;

pub use message::{IncomingMessage, OutgoingMessage};
pub use notification::Notification;
pub use record::{Delta, Record, Snapshot};
