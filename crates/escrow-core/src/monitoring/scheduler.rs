//! Periodic task scheduling.
//!
//! The synchronizer only needs "run this every N"; the [`Scheduler`] trait
//! keeps it independent of the timer implementation so tests and embedders can
//! drive refreshes however they like.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Task started on every tick. Each call returns a fresh future.
pub type PeriodicTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Schedules tasks at a fixed period.
pub trait Scheduler: Send + Sync {
	/// Runs `task` now and then every `interval` until the handle is cancelled
	/// or dropped.
	fn schedule_periodic(&self, interval: Duration, task: PeriodicTask) -> ScheduleHandle;
}

/// Handle to a periodic schedule. Dropping it stops the schedule.
///
/// Runs already started are not interrupted.
pub struct ScheduleHandle {
	cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ScheduleHandle {
	/// Creates a handle that calls `cancel` once when cancelled or dropped.
	pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
		Self {
			cancel: Some(Box::new(cancel)),
		}
	}

	/// Stops the schedule.
	pub fn cancel(mut self) {
		self.stop();
	}

	fn stop(&mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel();
		}
	}
}

impl Drop for ScheduleHandle {
	fn drop(&mut self) {
		self.stop();
	}
}

/// Scheduler backed by the tokio timer.
///
/// Each tick spawns its run as a separate task, so a slow run never delays
/// the next tick and runs may overlap.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
	fn schedule_periodic(&self, interval: Duration, task: PeriodicTask) -> ScheduleHandle {
		let timer = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			loop {
				ticker.tick().await;
				tokio::spawn(task());
			}
		});

		ScheduleHandle::new(move || timer.abort())
	}
}
