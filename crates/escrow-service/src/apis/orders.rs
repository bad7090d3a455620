//! Order snapshot reads and operator transitions.

use super::ApiError;
use escrow_core::EscrowEngine;
use escrow_types::{truncate_id, DerivedOrderRequest, Order, OrderCategory, OrderStatus, Transition};
use serde::Serialize;

/// Acknowledgement of an applied transition.
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
	pub order_id: String,
	pub status: OrderStatus,
}

/// Orders of the active view.
pub fn current_orders(engine: &EscrowEngine) -> Vec<Order> {
	engine.context().current_orders.latest().to_vec()
}

/// Latest snapshot of one category, addressed by its name.
pub fn category_orders(engine: &EscrowEngine, category: &str) -> Result<Vec<Order>, ApiError> {
	let category: OrderCategory = category
		.parse()
		.map_err(|_| ApiError::UnknownCategory(category.to_string()))?;
	Ok(engine.context().orders(category).latest().to_vec())
}

/// Latest derived signing queue.
pub fn signing_queue(engine: &EscrowEngine) -> Vec<DerivedOrderRequest> {
	engine.context().signing_queue.latest().to_vec()
}

/// Applies `transition` to `order_id` and waits for the follow-up resync.
pub async fn apply_transition(
	engine: &EscrowEngine,
	order_id: &str,
	transition: Transition,
) -> Result<TransitionResponse, ApiError> {
	tracing::debug!(order_id = %truncate_id(order_id), transition = %transition, "Transition requested");
	engine.dispatcher().dispatch(order_id, transition).await?;
	Ok(TransitionResponse {
		order_id: order_id.to_string(),
		status: transition.target_status(),
	})
}
