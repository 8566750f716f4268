//! Seams between the detection core and its collaborators.

pub mod channel;
pub mod source;

pub use channel::Channel;
pub use source::SnapshotSource;
