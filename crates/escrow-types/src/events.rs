//! Event types for inter-component communication.
//!
//! Events flow through the engine's event bus so that the service binary, the
//! API layer and tests can observe what the synchronizer, the view selector and
//! the action dispatcher did without coupling to them directly.

use crate::{OrderCategory, Transition};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all engine events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EscrowEvent {
	/// Events from the polling synchronizer.
	Sync(SyncEvent),
	/// Events from the view selector.
	View(ViewEvent),
	/// Events from the action dispatcher.
	Action(ActionEvent),
}

/// Events related to snapshot refreshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncEvent {
	/// A category snapshot was replaced.
	SnapshotRefreshed {
		category: OrderCategory,
		order_count: usize,
	},
	/// A response arrived after a newer one and was discarded.
	SnapshotDiscarded { category: OrderCategory, version: u64 },
	/// A category read failed; the previous snapshot was kept.
	RefreshFailed {
		category: OrderCategory,
		error: String,
	},
	/// The signing queue was re-derived.
	SigningQueueRefreshed { request_count: usize },
	/// The signing queue could not be refreshed.
	SigningQueueFailed { error: String },
}

/// Events related to the operator's active view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ViewEvent {
	/// A view became active and its snapshot was copied into the current orders.
	Activated {
		previous: Option<OrderCategory>,
		category: OrderCategory,
	},
}

/// Events related to operator-triggered transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActionEvent {
	/// The backend acknowledged the transition.
	TransitionConfirmed {
		order_id: String,
		transition: Transition,
	},
	/// The transition did not happen.
	TransitionFailed {
		order_id: String,
		transition: Transition,
		error: String,
	},
}
