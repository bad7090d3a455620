//! Active view queries and navigation.

use escrow_core::EscrowEngine;
use escrow_types::OrderCategory;
use serde::{Deserialize, Serialize};

/// Navigation request carrying the destination route.
#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
	pub route: String,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
	pub active: Option<OrderCategory>,
	/// Whether the request switched the view.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub changed: Option<bool>,
}

pub fn active_view(engine: &EscrowEngine) -> ViewResponse {
	ViewResponse {
		active: engine.selector().active(),
		changed: None,
	}
}

/// Routes that show no order list leave the active view as it is.
pub fn navigate(engine: &EscrowEngine, request: &NavigateRequest) -> ViewResponse {
	let changed = engine.selector().navigate(&request.route);
	ViewResponse {
		active: engine.selector().active(),
		changed: Some(changed),
	}
}
