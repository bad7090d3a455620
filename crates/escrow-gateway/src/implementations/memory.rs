//! In-memory escrow backend.
//!
//! Holds orders and evidence records in process. Useful for offline
//! development and tests where no backend is running. Transitions are checked
//! against the order lifecycle the same way the real backend does.

use crate::{GatewayError, GatewayFactory, GatewayInterface, GatewayRegistry};
use async_trait::async_trait;
use escrow_types::{
	ImplementationRegistry, MultiSigUtxo, Order, OrderCategory, PartiallySignedTransaction,
	Transition,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Records the memory backend starts with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemorySeed {
	#[serde(default)]
	pub orders: Vec<Order>,
	#[serde(default)]
	pub multi_sig_utxos: Vec<MultiSigUtxo>,
	#[serde(default)]
	pub partially_signed_transactions: Vec<PartiallySignedTransaction>,
}

/// In-memory gateway implementation.
pub struct MemoryGateway {
	/// Backend records protected by a read-write lock.
	records: Arc<RwLock<MemorySeed>>,
}

impl MemoryGateway {
	/// Creates a MemoryGateway holding the given records.
	pub fn new(seed: MemorySeed) -> Self {
		Self {
			records: Arc::new(RwLock::new(seed)),
		}
	}

	/// Inserts an order or replaces the one with the same id.
	pub async fn upsert_order(&self, order: Order) {
		let mut records = self.records.write().await;
		match records
			.orders
			.iter_mut()
			.find(|existing| existing.order_id == order.order_id)
		{
			Some(existing) => *existing = order,
			None => records.orders.push(order),
		}
	}
}

impl Default for MemoryGateway {
	fn default() -> Self {
		Self::new(MemorySeed::default())
	}
}

#[async_trait]
impl GatewayInterface for MemoryGateway {
	async fn fetch_orders(&self, category: OrderCategory) -> Result<Vec<Order>, GatewayError> {
		let records = self.records.read().await;
		Ok(records
			.orders
			.iter()
			.filter(|order| category.admits(order.status))
			.cloned()
			.collect())
	}

	async fn fetch_multi_sig_utxos(&self) -> Result<Vec<MultiSigUtxo>, GatewayError> {
		Ok(self.records.read().await.multi_sig_utxos.clone())
	}

	async fn fetch_partially_signed_transactions(
		&self,
	) -> Result<Vec<PartiallySignedTransaction>, GatewayError> {
		Ok(self.records.read().await.partially_signed_transactions.clone())
	}

	async fn submit_transition(
		&self,
		order_id: &str,
		transition: Transition,
	) -> Result<(), GatewayError> {
		let mut records = self.records.write().await;
		let order = records
			.orders
			.iter_mut()
			.find(|order| order.order_id == order_id)
			.ok_or_else(|| GatewayError::RejectedTransition {
				order_id: order_id.to_string(),
				reason: "unknown order".to_string(),
			})?;

		let target = transition.target_status();
		if order.status != transition.required_status() || !order.status.can_transition_to(target)
		{
			return Err(GatewayError::RejectedTransition {
				order_id: order_id.to_string(),
				reason: format!("cannot move from {} to {}", order.status, target),
			});
		}

		order.status = target;
		Ok(())
	}
}

/// Factory function to create a memory gateway from configuration.
///
/// Accepts optional `orders`, `multi_sig_utxos` and
/// `partially_signed_transactions` arrays used as initial records.
pub fn create_gateway(config: &toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError> {
	let seed: MemorySeed = config
		.clone()
		.try_into()
		.map_err(|e| GatewayError::Configuration(format!("Invalid memory gateway seed: {}", e)))?;

	for order in &seed.orders {
		order
			.validate()
			.map_err(|e| GatewayError::Configuration(e.to_string()))?;
	}

	Ok(Box::new(MemoryGateway::new(seed)))
}

/// Registry for the memory gateway implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = GatewayFactory;

	fn factory() -> Self::Factory {
		create_gateway
	}
}

impl GatewayRegistry for Registry {}
