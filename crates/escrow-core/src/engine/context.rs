//! Shared snapshot state of the engine.
//!
//! The context is constructed once by the composition root and handed to the
//! synchronizer, the view selector and the API layer by `Arc`. It holds no
//! logic of its own.

use crate::channel::SnapshotChannel;
use escrow_types::{DerivedOrderRequest, Order, OrderCategory};
use std::sync::Arc;

/// Channel carrying a list of orders.
pub type OrderChannel = SnapshotChannel<Vec<Order>>;

/// The snapshot channels exposed to display collaborators.
pub struct SyncContext {
	/// Orders waiting for payment.
	pub pending: Arc<OrderChannel>,
	/// Paid orders waiting for a merchant response.
	pub outstanding: Arc<OrderChannel>,
	/// Delivered and refunded orders.
	pub completed: Arc<OrderChannel>,
	/// Merchant signing queue derived from escrow evidence.
	pub signing_queue: Arc<SnapshotChannel<Vec<DerivedOrderRequest>>>,
	/// Orders of the view the operator is looking at.
	pub current_orders: Arc<OrderChannel>,
}

impl SyncContext {
	/// Creates a context with every channel empty.
	pub fn new() -> Self {
		Self {
			pending: Arc::new(SnapshotChannel::empty("pending")),
			outstanding: Arc::new(SnapshotChannel::empty("outstanding")),
			completed: Arc::new(SnapshotChannel::empty("completed")),
			signing_queue: Arc::new(SnapshotChannel::empty("signing_queue")),
			current_orders: Arc::new(SnapshotChannel::empty("current_orders")),
		}
	}

	/// Returns the channel holding `category`.
	pub fn orders(&self, category: OrderCategory) -> &Arc<OrderChannel> {
		match category {
			OrderCategory::Pending => &self.pending,
			OrderCategory::Outstanding => &self.outstanding,
			OrderCategory::Completed => &self.completed,
		}
	}
}

impl Default for SyncContext {
	fn default() -> Self {
		Self::new()
	}
}
