//! Remote order gateway for the escrow dashboard.
//!
//! This module is the network boundary of the system. It reads the three order
//! categories and the two evidence collections from the escrow backend and
//! submits the operator-triggered transitions. It never caches orders and
//! never mutates them locally: a transition becomes visible only after the
//! next successful read.

use async_trait::async_trait;
use escrow_types::{
	truncate_id, ImplementationRegistry, MultiSigUtxo, Order, OrderCategory,
	PartiallySignedTransaction, Transition,
};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod memory;
}

/// Errors that can occur while talking to the escrow backend.
#[derive(Debug, Error)]
pub enum GatewayError {
	/// The backend was unreachable, timed out or answered with a server error.
	#[error("Transport error: {0}")]
	Transport(String),
	/// The backend refused the requested state change.
	#[error("Transition rejected for order {order_id}: {reason}")]
	RejectedTransition { order_id: String, reason: String },
	/// The backend answered with a payload of the wrong shape.
	#[error("Malformed response from {endpoint}: {reason}")]
	MalformedResponse { endpoint: String, reason: String },
	/// The gateway implementation could not be configured.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl GatewayError {
	/// Returns true when the backend refused a transition.
	pub fn is_rejection(&self) -> bool {
		matches!(self, GatewayError::RejectedTransition { .. })
	}
}

/// Trait defining the interface for escrow backends.
///
/// Implementations only move data; checking that the returned orders are
/// consistent with the category they were requested for is done by
/// [`GatewayService`].
#[async_trait]
pub trait GatewayInterface: Send + Sync {
	/// Fetches every order currently in `category`.
	async fn fetch_orders(&self, category: OrderCategory) -> Result<Vec<Order>, GatewayError>;

	/// Fetches the outputs locking buyer funds in escrow.
	async fn fetch_multi_sig_utxos(&self) -> Result<Vec<MultiSigUtxo>, GatewayError>;

	/// Fetches settlement transactions holding some of the required signatures.
	async fn fetch_partially_signed_transactions(
		&self,
	) -> Result<Vec<PartiallySignedTransaction>, GatewayError>;

	/// Asks the backend to apply `transition` to `order_id`.
	///
	/// Returns only once the backend acknowledged the transition.
	async fn submit_transition(
		&self,
		order_id: &str,
		transition: Transition,
	) -> Result<(), GatewayError>;
}

/// Type alias for gateway factory functions.
pub type GatewayFactory = fn(&toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError>;

/// Registry trait for gateway implementations.
pub trait GatewayRegistry: ImplementationRegistry<Factory = GatewayFactory> {}

/// Get all registered gateway implementations.
///
/// Returns a vector of (name, factory) tuples used by the builder to select
/// the primary backend named in the configuration.
pub fn get_all_implementations() -> Vec<(&'static str, GatewayFactory)> {
	use implementations::{http, memory};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Typed facade over a backend implementation.
///
/// Exposes one operation per backend endpoint and rejects order snapshots
/// that violate the lifecycle invariants, so subscribers downstream only ever
/// see valid snapshots.
pub struct GatewayService {
	/// The underlying backend implementation.
	backend: Box<dyn GatewayInterface>,
}

impl GatewayService {
	/// Creates a new GatewayService with the specified backend.
	pub fn new(backend: Box<dyn GatewayInterface>) -> Self {
		Self { backend }
	}

	/// Fetches orders waiting for payment.
	pub async fn fetch_pending(&self) -> Result<Vec<Order>, GatewayError> {
		self.fetch_orders(OrderCategory::Pending).await
	}

	/// Fetches paid orders waiting for a merchant response.
	pub async fn fetch_outstanding(&self) -> Result<Vec<Order>, GatewayError> {
		self.fetch_orders(OrderCategory::Outstanding).await
	}

	/// Fetches delivered and refunded orders.
	pub async fn fetch_completed(&self) -> Result<Vec<Order>, GatewayError> {
		self.fetch_orders(OrderCategory::Completed).await
	}

	/// Fetches and validates the orders of one category.
	///
	/// A single invalid order rejects the whole response as malformed.
	pub async fn fetch_orders(&self, category: OrderCategory) -> Result<Vec<Order>, GatewayError> {
		let orders = self.backend.fetch_orders(category).await?;

		for order in &orders {
			order
				.validate()
				.map_err(|e| GatewayError::MalformedResponse {
					endpoint: category.path().to_string(),
					reason: e.to_string(),
				})?;

			if !category.admits(order.status) {
				return Err(GatewayError::MalformedResponse {
					endpoint: category.path().to_string(),
					reason: format!(
						"order {} has status {} which does not belong to {}",
						truncate_id(&order.order_id),
						order.status,
						category
					),
				});
			}
		}

		Ok(orders)
	}

	/// Fetches the outputs locking buyer funds in escrow.
	pub async fn fetch_multi_sig_utxos(&self) -> Result<Vec<MultiSigUtxo>, GatewayError> {
		self.backend.fetch_multi_sig_utxos().await
	}

	/// Fetches settlement transactions holding some of the required signatures.
	pub async fn fetch_partially_signed_transactions(
		&self,
	) -> Result<Vec<PartiallySignedTransaction>, GatewayError> {
		self.backend.fetch_partially_signed_transactions().await
	}

	/// Marks an outstanding order as being delivered.
	pub async fn mark_delivering(&self, order_id: &str) -> Result<(), GatewayError> {
		self.submit_transition(order_id, Transition::Deliver).await
	}

	/// Marks an outstanding order for refund.
	pub async fn mark_refunding(&self, order_id: &str) -> Result<(), GatewayError> {
		self.submit_transition(order_id, Transition::Refund).await
	}

	/// Submits a transition and waits for the backend acknowledgement.
	pub async fn submit_transition(
		&self,
		order_id: &str,
		transition: Transition,
	) -> Result<(), GatewayError> {
		tracing::debug!(
			order_id = %truncate_id(order_id),
			transition = %transition,
			"Submitting transition"
		);
		self.backend.submit_transition(order_id, transition).await
	}
}
