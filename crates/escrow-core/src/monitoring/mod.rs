//! Periodic refresh of the order snapshots.
//!
//! This module provides the scheduler abstraction and the polling
//! synchronizer that keeps the snapshot channels current by re-reading the
//! backend on a fixed interval and on demand.

pub mod scheduler;
pub mod synchronizer;

pub use scheduler::{PeriodicTask, ScheduleHandle, Scheduler, TokioScheduler};
pub use synchronizer::{PollingSynchronizer, RefreshOutcome, RefreshReport, Resync, SyncOptions};
