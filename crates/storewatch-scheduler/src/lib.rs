//! # StoreWatch Scheduler
//!
//! Drives detection cycles and delivers their notifications.
//!
//! ## Architecture
//! ```text
//! SchedulerEngine (daily instant, or manual trigger)
//!   └── cycle: SnapshotSource::fetch
//!                → ChangeDetector::diff
//!                → NotificationRenderer::render (per new record)
//!                → Dispatcher::dispatch (sequential, paced)
//! CommandRouter: status / check_now / reset_db → SchedulerEngine
//! ```

pub mod commands;
pub mod daily;
pub mod dispatch;
pub mod engine;

#[cfg(test)]
mod testing;

pub use commands::{Command, CommandRouter};
pub use daily::DailySchedule;
pub use dispatch::{DispatchReport, Dispatcher};
pub use engine::{CycleReport, EngineStatus, SchedulerEngine, SchedulerState, Trigger};
