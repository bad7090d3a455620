//! Handler for operator-triggered order transitions.
//!
//! A transition is written to the backend first. Only once the backend has
//! acknowledged it is a resync forced, so the snapshots never show a
//! transition that did not happen. Failures are reported to the caller and
//! never retried.

use crate::engine::event_bus::EventBus;
use crate::monitoring::Resync;
use escrow_gateway::{GatewayError, GatewayService};
use escrow_types::{truncate_id, ActionEvent, EscrowEvent, Transition};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while applying a transition.
#[derive(Debug, Error)]
pub enum ActionError {
	#[error("Order ID cannot be empty")]
	EmptyOrderId,
	#[error("Gateway error: {0}")]
	Gateway(#[from] GatewayError),
}

/// Applies mark-delivering and mark-refunding on behalf of the operator.
pub struct ActionDispatcher {
	gateway: Arc<GatewayService>,
	resync: Arc<dyn Resync>,
	event_bus: EventBus,
}

impl ActionDispatcher {
	pub fn new(gateway: Arc<GatewayService>, resync: Arc<dyn Resync>, event_bus: EventBus) -> Self {
		Self {
			gateway,
			resync,
			event_bus,
		}
	}

	/// Marks an outstanding order as being delivered.
	pub async fn mark_delivering(&self, order_id: &str) -> Result<(), ActionError> {
		self.dispatch(order_id, Transition::Deliver).await
	}

	/// Marks an outstanding order for refund.
	pub async fn mark_refunding(&self, order_id: &str) -> Result<(), ActionError> {
		self.dispatch(order_id, Transition::Refund).await
	}

	/// Writes `transition` and, once acknowledged, refreshes every snapshot.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), transition = %transition))]
	pub async fn dispatch(&self, order_id: &str, transition: Transition) -> Result<(), ActionError> {
		if order_id.is_empty() {
			return Err(ActionError::EmptyOrderId);
		}

		if let Err(e) = self.gateway.submit_transition(order_id, transition).await {
			if e.is_rejection() {
				tracing::warn!(error = %e, "Backend rejected transition");
			} else {
				tracing::error!(error = %e, "Failed to submit transition");
			}
			self.event_bus
				.publish(EscrowEvent::Action(ActionEvent::TransitionFailed {
					order_id: order_id.to_string(),
					transition,
					error: e.to_string(),
				}))
				.ok();
			return Err(e.into());
		}

		let report = self.resync.refresh_now().await;
		if !report.is_complete() {
			tracing::warn!("Resync after transition left some snapshots stale");
		}

		tracing::info!("Transition confirmed");
		self.event_bus
			.publish(EscrowEvent::Action(ActionEvent::TransitionConfirmed {
				order_id: order_id.to_string(),
				transition,
			}))
			.ok();
		Ok(())
	}
}
