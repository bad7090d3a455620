//! Common types module for the escrow order dashboard.
//!
//! This module defines the core data types shared by the gateway, the
//! synchronization engine and the service binary. It provides a centralized
//! location for domain types so that every component agrees on the wire
//! shapes served by the escrow backend.

/// Multi-signature evidence records and the derived signing-queue view.
pub mod evidence;
/// Event types for inter-component communication.
pub mod events;
/// Orders, their lifecycle status and the operator view categories.
pub mod order;
/// Registry trait for implementations selected from configuration.
pub mod registry;
/// Utility functions for display-oriented formatting.
pub mod utils;

// Re-export all types for convenient access
pub use evidence::*;
pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use utils::truncate_id;
