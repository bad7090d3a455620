//! On-chain escrow evidence and the merchant signing queue.
//!
//! The backend records two kinds of evidence: outputs that lock buyer funds
//! behind the multi-signature escrow script, and settlement transactions that
//! have collected some of the required signatures. The signing queue is a
//! view derived from both; it is never stored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite key identifying one escrow output of one order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputKey {
	pub order_id: String,
	pub tx_id: String,
	pub output_id: u32,
}

impl fmt::Display for OutputKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}:{}", self.order_id, self.tx_id, self.output_id)
	}
}

/// Evidence that buyer funds are locked in a multi-signature escrow output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MultiSigUtxo {
	pub order_id: String,
	pub tx_id: String,
	pub output_id: u32,
	pub date: String,
}

impl MultiSigUtxo {
	/// Returns the composite key of the locked output.
	pub fn key(&self) -> OutputKey {
		OutputKey {
			order_id: self.order_id.clone(),
			tx_id: self.tx_id.clone(),
			output_id: self.output_id,
		}
	}
}

/// Evidence that a co-signer contributed a signature toward releasing an output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartiallySignedTransaction {
	pub order_id: String,
	pub tx_id: String,
	pub output_id: u32,
	pub hash: String,
	pub date: String,
}

impl PartiallySignedTransaction {
	/// Returns the composite key of the output this signature releases.
	pub fn key(&self) -> OutputKey {
		OutputKey {
			order_id: self.order_id.clone(),
			tx_id: self.tx_id.clone(),
			output_id: self.output_id,
		}
	}
}

/// Status of an entry in the merchant signing queue.
///
/// Distinct from [`crate::OrderStatus`]: it describes signing progress of a
/// single escrow output, not the order lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
	Pending,
	MultisigInProgress,
	Delivered,
	Paid,
	Refunded,
}

impl fmt::Display for RequestStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RequestStatus::Pending => write!(f, "PENDING"),
			RequestStatus::MultisigInProgress => write!(f, "MULTISIG_IN_PROGRESS"),
			RequestStatus::Delivered => write!(f, "DELIVERED"),
			RequestStatus::Paid => write!(f, "PAID"),
			RequestStatus::Refunded => write!(f, "REFUNDED"),
		}
	}
}

/// One entry of the merchant signing queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DerivedOrderRequest {
	pub order_id: String,
	pub tx_id: String,
	pub output_id: u32,
	pub status: RequestStatus,
	/// Date the escrow output was recorded.
	pub requested_at: String,
}

/// How to treat several partially-signed transactions for the same output.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
	/// The first partially-signed transaction encountered wins.
	#[default]
	FirstMatch,
	/// More than one partially-signed transaction per output is an error.
	Strict,
}
