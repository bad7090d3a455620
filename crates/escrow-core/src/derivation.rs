//! Derivation of the merchant signing queue.
//!
//! The signing queue is never stored. It is recomputed from the backend's
//! multi-signature UTXO records and partially-signed transactions every time
//! either collection is refreshed.

use escrow_types::{
	DerivedOrderRequest, MatchPolicy, MultiSigUtxo, OutputKey, PartiallySignedTransaction,
	RequestStatus,
};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors that can occur while deriving the signing queue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DerivationError {
	/// Several partially-signed transactions claim the same escrow output.
	#[error("Ambiguous partial signatures for outputs: {}", join_keys(.0))]
	AmbiguousSignatures(Vec<OutputKey>),
}

fn join_keys(keys: &[OutputKey]) -> String {
	keys.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join(", ")
}

/// Builds one signing-queue entry per UTXO, in UTXO order.
///
/// An entry is `MULTISIG_IN_PROGRESS` when some partially-signed transaction
/// has exactly the UTXO's `(order_id, tx_id, output_id)`, otherwise
/// `PENDING`. When several partials share a key the first one encountered
/// is the match; use [`derive_with_policy`] to refuse that case instead.
pub fn derive(
	utxos: &[MultiSigUtxo],
	partials: &[PartiallySignedTransaction],
) -> Vec<DerivedOrderRequest> {
	let signed: HashSet<(&str, &str, u32)> = partials
		.iter()
		.map(|p| (p.order_id.as_str(), p.tx_id.as_str(), p.output_id))
		.collect();

	utxos
		.iter()
		.map(|utxo| {
			let key = (utxo.order_id.as_str(), utxo.tx_id.as_str(), utxo.output_id);
			let status = if signed.contains(&key) {
				RequestStatus::MultisigInProgress
			} else {
				RequestStatus::Pending
			};

			DerivedOrderRequest {
				order_id: utxo.order_id.clone(),
				tx_id: utxo.tx_id.clone(),
				output_id: utxo.output_id,
				status,
				requested_at: utxo.date.clone(),
			}
		})
		.collect()
}

/// Derives the signing queue, applying `policy` to outputs matched by more
/// than one partially-signed transaction.
///
/// Under [`MatchPolicy::Strict`] only outputs that actually appear among
/// `utxos` count as ambiguous.
pub fn derive_with_policy(
	utxos: &[MultiSigUtxo],
	partials: &[PartiallySignedTransaction],
	policy: MatchPolicy,
) -> Result<Vec<DerivedOrderRequest>, DerivationError> {
	if policy == MatchPolicy::Strict {
		let locked: HashSet<OutputKey> = utxos.iter().map(MultiSigUtxo::key).collect();
		let conflicting: Vec<OutputKey> = ambiguous_keys(partials)
			.into_iter()
			.filter(|key| locked.contains(key))
			.collect();
		if !conflicting.is_empty() {
			return Err(DerivationError::AmbiguousSignatures(conflicting));
		}
	}

	Ok(derive(utxos, partials))
}

/// Lists the output keys claimed by more than one partially-signed
/// transaction, in key order.
pub fn ambiguous_keys(partials: &[PartiallySignedTransaction]) -> Vec<OutputKey> {
	let mut counts: BTreeMap<OutputKey, usize> = BTreeMap::new();
	for partial in partials {
		*counts.entry(partial.key()).or_default() += 1;
	}

	counts
		.into_iter()
		.filter(|(_, count)| *count > 1)
		.map(|(key, _)| key)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn utxo(order_id: &str, tx_id: &str, output_id: u32, date: &str) -> MultiSigUtxo {
		MultiSigUtxo {
			order_id: order_id.to_string(),
			tx_id: tx_id.to_string(),
			output_id,
			date: date.to_string(),
		}
	}

	fn partial(order_id: &str, tx_id: &str, output_id: u32, hash: &str) -> PartiallySignedTransaction {
		PartiallySignedTransaction {
			order_id: order_id.to_string(),
			tx_id: tx_id.to_string(),
			output_id,
			hash: hash.to_string(),
			date: "t9".to_string(),
		}
	}

	#[test]
	fn test_unsigned_output_is_pending() {
		let derived = derive(&[utxo("1", "a", 0, "t0")], &[]);

		assert_eq!(
			derived,
			vec![DerivedOrderRequest {
				order_id: "1".to_string(),
				tx_id: "a".to_string(),
				output_id: 0,
				status: RequestStatus::Pending,
				requested_at: "t0".to_string(),
			}]
		);
	}

	#[test]
	fn test_matching_partial_marks_in_progress() {
		let derived = derive(&[utxo("1", "a", 0, "t0")], &[partial("1", "a", 0, "h")]);

		assert_eq!(derived.len(), 1);
		assert_eq!(derived[0].status, RequestStatus::MultisigInProgress);
		assert_eq!(derived[0].requested_at, "t0");
	}

	#[test]
	fn test_match_requires_every_key_component() {
		let utxos = [utxo("1", "a", 0, "t0")];

		for near_miss in [
			partial("2", "a", 0, "h"),
			partial("1", "b", 0, "h"),
			partial("1", "a", 1, "h"),
		] {
			let derived = derive(&utxos, &[near_miss]);
			assert_eq!(derived[0].status, RequestStatus::Pending);
		}
	}

	#[test]
	fn test_one_entry_per_utxo_in_order() {
		let utxos = [
			utxo("3", "c", 1, "t3"),
			utxo("1", "a", 0, "t1"),
			utxo("2", "b", 0, "t2"),
		];
		let partials = [partial("1", "a", 0, "h1"), partial("9", "z", 0, "h9")];

		let derived = derive(&utxos, &partials);

		let summary: Vec<_> = derived
			.iter()
			.map(|r| (r.order_id.as_str(), r.status))
			.collect();
		assert_eq!(
			summary,
			vec![
				("3", RequestStatus::Pending),
				("1", RequestStatus::MultisigInProgress),
				("2", RequestStatus::Pending),
			]
		);
	}

	#[test]
	fn test_empty_utxos_yield_nothing() {
		assert!(derive(&[], &[]).is_empty());
		assert!(derive(&[], &[partial("1", "a", 0, "h")]).is_empty());
	}

	#[test]
	fn test_derivation_is_repeatable() {
		let utxos = [utxo("1", "a", 0, "t0"), utxo("1", "a", 1, "t1")];
		let partials = [partial("1", "a", 1, "h")];

		assert_eq!(derive(&utxos, &partials), derive(&utxos, &partials));
	}

	#[test]
	fn test_first_match_tolerates_duplicates() {
		let utxos = [utxo("1", "a", 0, "t0")];
		let partials = [partial("1", "a", 0, "h1"), partial("1", "a", 0, "h2")];

		let derived = derive_with_policy(&utxos, &partials, MatchPolicy::FirstMatch).unwrap();
		assert_eq!(derived[0].status, RequestStatus::MultisigInProgress);
		assert_eq!(ambiguous_keys(&partials), vec![utxos[0].key()]);
	}

	#[test]
	fn test_strict_rejects_duplicates() {
		let utxos = [utxo("1", "a", 0, "t0"), utxo("2", "b", 0, "t1")];
		let partials = [
			partial("2", "b", 0, "h1"),
			partial("1", "a", 0, "h2"),
			partial("2", "b", 0, "h3"),
		];

		let err = derive_with_policy(&utxos, &partials, MatchPolicy::Strict).unwrap_err();
		assert_eq!(err, DerivationError::AmbiguousSignatures(vec![utxos[1].key()]));
		assert!(err.to_string().contains("2:b:0"));
	}

	#[test]
	fn test_strict_ignores_duplicates_without_utxo() {
		let utxos = [utxo("1", "a", 0, "t0")];
		let partials = [partial("7", "x", 0, "h1"), partial("7", "x", 0, "h2")];

		let derived = derive_with_policy(&utxos, &partials, MatchPolicy::Strict).unwrap();
		assert_eq!(derived[0].status, RequestStatus::Pending);
	}
}
