//! Order types for the escrow settlement lifecycle.
//!
//! This module defines the order record served by the escrow backend, its
//! lifecycle status machine, the three operator view categories orders are
//! grouped into, and the operator-triggered transitions.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A single escrow-mediated purchase order.
///
/// Orders are owned by the backend; the dashboard only ever holds transient
/// copies of them inside snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
	/// Unique identifier for this order.
	pub order_id: String,
	/// Order amount, transported as a decimal string.
	pub amount: Decimal,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Address the buyer paid from.
	pub buyer_address: String,
	/// Transaction that paid into escrow. Empty until payment is observed.
	#[serde(default)]
	pub payment_transaction_id: String,
	/// Transaction that released escrow. Empty until settlement is observed.
	#[serde(default)]
	pub settlement_transaction_id: String,
}

/// Ways in which an order record can violate the lifecycle invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderValidationError {
	#[error("Order ID cannot be empty")]
	MissingId,
	#[error("Order {0} has a negative amount")]
	NegativeAmount(String),
	#[error("Order {order_id} is {status} but has no payment transaction")]
	MissingPaymentTransaction { order_id: String, status: OrderStatus },
	#[error("Order {order_id} is {status} but has no settlement transaction")]
	MissingSettlementTransaction { order_id: String, status: OrderStatus },
}

impl Order {
	/// Checks that the fields required by the order's current stage are present.
	pub fn validate(&self) -> Result<(), OrderValidationError> {
		if self.order_id.is_empty() {
			return Err(OrderValidationError::MissingId);
		}
		if self.amount < Decimal::ZERO {
			return Err(OrderValidationError::NegativeAmount(self.order_id.clone()));
		}
		if self.status != OrderStatus::PendingPayment && self.payment_transaction_id.is_empty() {
			return Err(OrderValidationError::MissingPaymentTransaction {
				order_id: self.order_id.clone(),
				status: self.status,
			});
		}
		if self.status.is_terminal() && self.settlement_transaction_id.is_empty() {
			return Err(OrderValidationError::MissingSettlementTransaction {
				order_id: self.order_id.clone(),
				status: self.status,
			});
		}
		Ok(())
	}
}

/// Lifecycle status of an escrow order.
///
/// `PendingPayment -> PendingResponse -> {Delivering | Refunding} -> {Completed | Refunded}`.
/// No transition skips a stage and none moves backward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrderStatus {
	/// Waiting for the buyer to fund the escrow.
	PendingPayment,
	/// Funded; waiting for the merchant to deliver or refund.
	PendingResponse,
	/// Merchant marked the order as being delivered.
	Delivering,
	/// Merchant marked the order for refund.
	Refunding,
	/// Settlement released funds to the merchant.
	Completed,
	/// Settlement returned funds to the buyer.
	Refunded,
}

impl OrderStatus {
	/// Returns true for statuses with no outgoing transitions.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Completed | OrderStatus::Refunded)
	}

	/// Checks whether the lifecycle allows moving from `self` to `next`.
	pub fn can_transition_to(&self, next: OrderStatus) -> bool {
		// Static transition table - each state maps to allowed next states
		static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
			let mut m = HashMap::new();
			m.insert(
				OrderStatus::PendingPayment,
				HashSet::from([OrderStatus::PendingResponse]),
			);
			m.insert(
				OrderStatus::PendingResponse,
				HashSet::from([OrderStatus::Delivering, OrderStatus::Refunding]),
			);
			m.insert(
				OrderStatus::Delivering,
				HashSet::from([OrderStatus::Completed]),
			);
			m.insert(OrderStatus::Refunding, HashSet::from([OrderStatus::Refunded]));
			m.insert(OrderStatus::Completed, HashSet::new()); // terminal
			m.insert(OrderStatus::Refunded, HashSet::new()); // terminal
			m
		});

		TRANSITIONS
			.get(self)
			.is_some_and(|set| set.contains(&next))
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::PendingPayment => write!(f, "PendingPayment"),
			OrderStatus::PendingResponse => write!(f, "PendingResponse"),
			OrderStatus::Delivering => write!(f, "Delivering"),
			OrderStatus::Refunding => write!(f, "Refunding"),
			OrderStatus::Completed => write!(f, "Completed"),
			OrderStatus::Refunded => write!(f, "Refunded"),
		}
	}
}

/// The order categories the backend serves and the operator can view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderCategory {
	/// Orders waiting for payment.
	Pending,
	/// Paid orders waiting for a merchant response.
	Outstanding,
	/// Settled orders, delivered or refunded.
	Completed,
}

impl OrderCategory {
	/// Returns an iterator over all categories.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Pending, Self::Outstanding, Self::Completed].into_iter()
	}

	/// Returns the string representation of the category.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderCategory::Pending => "pending",
			OrderCategory::Outstanding => "outstanding",
			OrderCategory::Completed => "completed",
		}
	}

	/// Backend path serving this category.
	pub fn path(&self) -> &'static str {
		match self {
			OrderCategory::Pending => "/order/pending",
			OrderCategory::Outstanding => "/order/outstanding",
			OrderCategory::Completed => "/order/completed",
		}
	}

	/// Checks whether an order with `status` belongs in this category.
	pub fn admits(&self, status: OrderStatus) -> bool {
		match self {
			OrderCategory::Pending => status == OrderStatus::PendingPayment,
			OrderCategory::Outstanding => status == OrderStatus::PendingResponse,
			OrderCategory::Completed => {
				matches!(status, OrderStatus::Completed | OrderStatus::Refunded)
			},
		}
	}

	/// Maps a navigation destination to the order view it shows.
	///
	/// Accepts the console routes (`orders/pending-payment`,
	/// `orders/pending-response`, `orders/settled`) as well as the bare
	/// category names. Returns `None` for routes that show no order list.
	pub fn from_route(route: &str) -> Option<Self> {
		let path = route
			.split(['?', '#'])
			.next()
			.unwrap_or_default()
			.trim_matches('/');

		match path {
			"orders/pending-payment" => Some(Self::Pending),
			"orders/pending-response" => Some(Self::Outstanding),
			"orders/settled" => Some(Self::Completed),
			other => other.parse().ok(),
		}
	}
}

impl fmt::Display for OrderCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderCategory {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(Self::Pending),
			"outstanding" => Ok(Self::Outstanding),
			"completed" => Ok(Self::Completed),
			_ => Err(()),
		}
	}
}

/// Operator-triggered transitions on an outstanding order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
	/// Mark the order as being delivered.
	Deliver,
	/// Mark the order for refund.
	Refund,
}

impl Transition {
	/// Status the order holds once the backend accepts the transition.
	pub fn target_status(&self) -> OrderStatus {
		match self {
			Transition::Deliver => OrderStatus::Delivering,
			Transition::Refund => OrderStatus::Refunding,
		}
	}

	/// Status the order must hold for the transition to be accepted.
	pub fn required_status(&self) -> OrderStatus {
		OrderStatus::PendingResponse
	}

	/// Backend path accepting this transition.
	pub fn path(&self) -> &'static str {
		match self {
			Transition::Deliver => "/order/delivering",
			Transition::Refund => "/order/refunding",
		}
	}
}

impl fmt::Display for Transition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Transition::Deliver => write!(f, "delivering"),
			Transition::Refund => write!(f, "refunding"),
		}
	}
}
