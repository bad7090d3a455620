//! Synchronization engine for the escrow order dashboard.
//!
//! This crate keeps process-wide snapshots of the backend's order categories
//! current, fans the active category out to a single "current orders"
//! channel, derives the merchant signing queue from on-chain evidence and
//! applies operator-triggered transitions followed by an immediate resync.
//! The [`builder`] composes these parts from configuration into an
//! [`EscrowEngine`].

pub mod builder;
pub mod channel;
pub mod derivation;
pub mod engine;
pub mod handlers;
pub mod monitoring;
pub mod routing;

#[cfg(test)]
mod test_utils;

pub use builder::{BuilderError, EscrowBuilder, EscrowFactories};
pub use channel::{SnapshotChannel, SubscriptionToken};
pub use derivation::{ambiguous_keys, derive, derive_with_policy, DerivationError};
pub use engine::{context::SyncContext, event_bus::EventBus, EngineError, EscrowEngine};
pub use handlers::{ActionDispatcher, ActionError};
pub use monitoring::{
	PollingSynchronizer, RefreshOutcome, RefreshReport, Resync, ScheduleHandle, Scheduler,
	SyncOptions, TokioScheduler,
};
pub use routing::ViewSelector;
