//! Shared fixtures for the engine's unit tests.

use async_trait::async_trait;
use escrow_gateway::{GatewayError, GatewayInterface, GatewayService};
use escrow_types::{
	MultiSigUtxo, Order, OrderCategory, OrderStatus, PartiallySignedTransaction, Transition,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mockall::mock! {
	pub Backend {}

	#[async_trait]
	impl GatewayInterface for Backend {
		async fn fetch_orders(&self, category: OrderCategory) -> Result<Vec<Order>, GatewayError>;
		async fn fetch_multi_sig_utxos(&self) -> Result<Vec<MultiSigUtxo>, GatewayError>;
		async fn fetch_partially_signed_transactions(
			&self,
		) -> Result<Vec<PartiallySignedTransaction>, GatewayError>;
		async fn submit_transition(
			&self,
			order_id: &str,
			transition: Transition,
		) -> Result<(), GatewayError>;
	}
}

/// Builds an order carrying the fields its status requires.
pub fn order(id: &str, status: OrderStatus) -> Order {
	Order {
		order_id: id.to_string(),
		amount: Decimal::new(100, 0),
		status,
		buyer_address: "0xbuyer".to_string(),
		payment_transaction_id: if status == OrderStatus::PendingPayment {
			String::new()
		} else {
			format!("0xpay{id}")
		},
		settlement_transaction_id: if status.is_terminal() {
			format!("0xsettle{id}")
		} else {
			String::new()
		},
	}
}

pub fn utxo(order_id: &str, tx_id: &str, output_id: u32) -> MultiSigUtxo {
	MultiSigUtxo {
		order_id: order_id.to_string(),
		tx_id: tx_id.to_string(),
		output_id,
		date: "2024-05-01T10:00:00Z".to_string(),
	}
}

pub fn partial(order_id: &str, tx_id: &str, output_id: u32) -> PartiallySignedTransaction {
	PartiallySignedTransaction {
		order_id: order_id.to_string(),
		tx_id: tx_id.to_string(),
		output_id,
		hash: format!("0xhash{order_id}"),
		date: "2024-05-01T11:00:00Z".to_string(),
	}
}

/// One scripted answer to a category read.
pub struct Reply {
	pub delay: Duration,
	pub result: Result<Vec<Order>, GatewayError>,
}

#[derive(Default)]
struct Script {
	orders: Mutex<HashMap<OrderCategory, Vec<Order>>>,
	queued: Mutex<HashMap<OrderCategory, VecDeque<Reply>>>,
	utxos: Mutex<Vec<MultiSigUtxo>>,
	partials: Mutex<Vec<PartiallySignedTransaction>>,
	partials_failure: Mutex<Option<String>>,
	order_reads: AtomicUsize,
}

/// Backend whose answers are set by the test.
///
/// Queued replies are consumed first, in order; once a category's queue is
/// empty its standing order list is returned.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
	script: Arc<Script>,
}

impl ScriptedBackend {
	pub fn set_orders(&self, category: OrderCategory, orders: Vec<Order>) {
		self.script.orders.lock().unwrap().insert(category, orders);
	}

	pub fn queue(&self, category: OrderCategory, delay: Duration, result: Result<Vec<Order>, GatewayError>) {
		self.script
			.queued
			.lock()
			.unwrap()
			.entry(category)
			.or_default()
			.push_back(Reply { delay, result });
	}

	pub fn set_evidence(&self, utxos: Vec<MultiSigUtxo>, partials: Vec<PartiallySignedTransaction>) {
		*self.script.utxos.lock().unwrap() = utxos;
		*self.script.partials.lock().unwrap() = partials;
	}

	/// Makes partially-signed transaction reads fail with a transport error
	/// until cleared with `None`.
	pub fn fail_partials(&self, error: Option<&str>) {
		*self.script.partials_failure.lock().unwrap() = error.map(str::to_string);
	}

	pub fn order_reads(&self) -> usize {
		self.script.order_reads.load(Ordering::SeqCst)
	}

	pub fn service(&self) -> Arc<GatewayService> {
		Arc::new(GatewayService::new(Box::new(self.clone())))
	}
}

#[async_trait]
impl GatewayInterface for ScriptedBackend {
	async fn fetch_orders(&self, category: OrderCategory) -> Result<Vec<Order>, GatewayError> {
		self.script.order_reads.fetch_add(1, Ordering::SeqCst);
		let queued = self
			.script
			.queued
			.lock()
			.unwrap()
			.get_mut(&category)
			.and_then(VecDeque::pop_front);

		match queued {
			Some(reply) => {
				tokio::time::sleep(reply.delay).await;
				reply.result
			},
			None => Ok(self
				.script
				.orders
				.lock()
				.unwrap()
				.get(&category)
				.cloned()
				.unwrap_or_default()),
		}
	}

	async fn fetch_multi_sig_utxos(&self) -> Result<Vec<MultiSigUtxo>, GatewayError> {
		Ok(self.script.utxos.lock().unwrap().clone())
	}

	async fn fetch_partially_signed_transactions(
		&self,
	) -> Result<Vec<PartiallySignedTransaction>, GatewayError> {
		if let Some(error) = self.script.partials_failure.lock().unwrap().clone() {
			return Err(GatewayError::Transport(error));
		}
		Ok(self.script.partials.lock().unwrap().clone())
	}

	async fn submit_transition(
		&self,
		_order_id: &str,
		_transition: Transition,
	) -> Result<(), GatewayError> {
		Ok(())
	}
}
