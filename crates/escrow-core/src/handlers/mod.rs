//! Handlers for operator-triggered actions.
//!
//! Currently only order transitions, which write to the backend and then
//! force an immediate resynchronization of the snapshots.

pub mod action;

pub use action::{ActionDispatcher, ActionError};
