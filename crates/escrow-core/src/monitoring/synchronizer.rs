//! Polling synchronizer for the order snapshots.
//!
//! Every refresh reads the three order categories (and, when enabled, the
//! signing-queue evidence) concurrently. Each successful read replaces its
//! channel wholesale; a failed read is logged and leaves its channel as it
//! was. Reads are never serialized: a timer tick and an explicit
//! [`PollingSynchronizer::refresh_now`] may overlap freely.
//!
//! Every read takes a per-channel ticket before it is dispatched. A response
//! is only published if no read issued after it has been published already,
//! so a slow response can never overwrite a newer one.

use super::scheduler::{PeriodicTask, ScheduleHandle, Scheduler};
use crate::derivation::{ambiguous_keys, derive_with_policy};
use crate::engine::{context::SyncContext, event_bus::EventBus};
use async_trait::async_trait;
use escrow_config::SyncConfig;
use escrow_gateway::GatewayService;
use escrow_types::{EscrowEvent, MatchPolicy, OrderCategory, SyncEvent};
use futures::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Result of one channel's read within a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// The channel was replaced with this many entries.
	Applied(usize),
	/// A newer read had already been published; this response was dropped.
	Stale,
	/// The read failed and the channel kept its previous snapshot.
	Failed(String),
}

impl RefreshOutcome {
	pub fn is_applied(&self) -> bool {
		matches!(self, RefreshOutcome::Applied(_))
	}
}

/// Per-channel outcomes of one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
	pub pending: RefreshOutcome,
	pub outstanding: RefreshOutcome,
	pub completed: RefreshOutcome,
	/// `None` when the signing queue is not refreshed.
	pub signing_queue: Option<RefreshOutcome>,
}

impl RefreshReport {
	/// Returns the outcome for `category`.
	pub fn outcome(&self, category: OrderCategory) -> &RefreshOutcome {
		match category {
			OrderCategory::Pending => &self.pending,
			OrderCategory::Outstanding => &self.outstanding,
			OrderCategory::Completed => &self.completed,
		}
	}

	/// Returns true if no read failed.
	pub fn is_complete(&self) -> bool {
		OrderCategory::all()
			.map(|category| self.outcome(category))
			.chain(self.signing_queue.as_ref())
			.all(|outcome| !matches!(outcome, RefreshOutcome::Failed(_)))
	}
}

/// Out-of-band resynchronization, as needed after a transition write.
#[async_trait]
pub trait Resync: Send + Sync {
	/// Refreshes every channel now and waits for the reads to settle.
	async fn refresh_now(&self) -> RefreshReport;
}

/// Tuning of the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncOptions {
	/// Period between scheduled refreshes.
	pub interval: Duration,
	/// Whether the signing queue is refreshed with the orders.
	pub signing_queue: bool,
	/// Treatment of several partial signatures for one output.
	pub match_policy: MatchPolicy,
}

impl Default for SyncOptions {
	fn default() -> Self {
		Self::from(&SyncConfig::default())
	}
}

impl From<&SyncConfig> for SyncOptions {
	fn from(config: &SyncConfig) -> Self {
		Self {
			interval: config.poll_interval(),
			signing_queue: config.signing_queue,
			match_policy: config.match_policy,
		}
	}
}

/// Keeps the snapshot channels of a [`SyncContext`] current.
pub struct PollingSynchronizer {
	gateway: Arc<GatewayService>,
	context: Arc<SyncContext>,
	event_bus: EventBus,
	options: SyncOptions,
	pending_ticket: AtomicU64,
	outstanding_ticket: AtomicU64,
	completed_ticket: AtomicU64,
	signing_queue_ticket: AtomicU64,
}

impl PollingSynchronizer {
	pub fn new(
		gateway: Arc<GatewayService>,
		context: Arc<SyncContext>,
		event_bus: EventBus,
		options: SyncOptions,
	) -> Self {
		Self {
			gateway,
			context,
			event_bus,
			options,
			pending_ticket: AtomicU64::new(0),
			outstanding_ticket: AtomicU64::new(0),
			completed_ticket: AtomicU64::new(0),
			signing_queue_ticket: AtomicU64::new(0),
		}
	}

	/// Schedules a refresh now and on every interval.
	///
	/// Polling stops when the returned handle is dropped.
	pub fn start(self: &Arc<Self>, scheduler: &dyn Scheduler) -> ScheduleHandle {
		let synchronizer = Arc::clone(self);
		let task: PeriodicTask = Arc::new(move || {
			let synchronizer = synchronizer.clone();
			async move {
				let report = synchronizer.refresh_now().await;
				if !report.is_complete() {
					tracing::debug!("Scheduled refresh completed with failures");
				}
			}
			.boxed()
		});

		tracing::info!(
			interval_ms = self.options.interval.as_millis() as u64,
			signing_queue = self.options.signing_queue,
			"Starting order polling"
		);
		scheduler.schedule_periodic(self.options.interval, task)
	}

	/// Reads every channel concurrently and publishes the results.
	#[instrument(skip_all)]
	pub async fn refresh_now(&self) -> RefreshReport {
		let signing_queue = async {
			if self.options.signing_queue {
				Some(self.refresh_signing_queue().await)
			} else {
				None
			}
		};

		let (pending, outstanding, completed, signing_queue) = tokio::join!(
			self.refresh_category(OrderCategory::Pending),
			self.refresh_category(OrderCategory::Outstanding),
			self.refresh_category(OrderCategory::Completed),
			signing_queue,
		);

		RefreshReport {
			pending,
			outstanding,
			completed,
			signing_queue,
		}
	}

	fn ticket(&self, category: OrderCategory) -> &AtomicU64 {
		match category {
			OrderCategory::Pending => &self.pending_ticket,
			OrderCategory::Outstanding => &self.outstanding_ticket,
			OrderCategory::Completed => &self.completed_ticket,
		}
	}

	async fn refresh_category(&self, category: OrderCategory) -> RefreshOutcome {
		let ticket = self.ticket(category).fetch_add(1, Ordering::SeqCst) + 1;

		let orders = match self.gateway.fetch_orders(category).await {
			Ok(orders) => orders,
			Err(e) => {
				tracing::warn!(category = %category, error = %e, "Failed to refresh orders");
				self.event_bus
					.publish(EscrowEvent::Sync(SyncEvent::RefreshFailed {
						category,
						error: e.to_string(),
					}))
					.ok();
				return RefreshOutcome::Failed(e.to_string());
			},
		};

		let order_count = orders.len();
		if !self.context.orders(category).publish_versioned(ticket, orders) {
			tracing::debug!(category = %category, ticket, "Discarded stale response");
			self.event_bus
				.publish(EscrowEvent::Sync(SyncEvent::SnapshotDiscarded {
					category,
					version: ticket,
				}))
				.ok();
			return RefreshOutcome::Stale;
		}

		tracing::debug!(category = %category, order_count, "Snapshot refreshed");
		self.event_bus
			.publish(EscrowEvent::Sync(SyncEvent::SnapshotRefreshed {
				category,
				order_count,
			}))
			.ok();
		RefreshOutcome::Applied(order_count)
	}

	async fn refresh_signing_queue(&self) -> RefreshOutcome {
		let ticket = self.signing_queue_ticket.fetch_add(1, Ordering::SeqCst) + 1;

		let evidence = tokio::try_join!(
			self.gateway.fetch_multi_sig_utxos(),
			self.gateway.fetch_partially_signed_transactions(),
		);
		let derived = evidence
			.map_err(|e| e.to_string())
			.and_then(|(utxos, partials)| {
				if self.options.match_policy == MatchPolicy::FirstMatch {
					for key in ambiguous_keys(&partials) {
						tracing::warn!(
							output = %key,
							"Several partially-signed transactions for one output, using the first"
						);
					}
				}
				derive_with_policy(&utxos, &partials, self.options.match_policy)
					.map_err(|e| e.to_string())
			});

		let requests = match derived {
			Ok(requests) => requests,
			Err(error) => {
				tracing::warn!(error = %error, "Failed to refresh signing queue");
				self.event_bus
					.publish(EscrowEvent::Sync(SyncEvent::SigningQueueFailed {
						error: error.clone(),
					}))
					.ok();
				return RefreshOutcome::Failed(error);
			},
		};

		let request_count = requests.len();
		if !self.context.signing_queue.publish_versioned(ticket, requests) {
			tracing::debug!(ticket, "Discarded stale signing queue");
			return RefreshOutcome::Stale;
		}

		self.event_bus
			.publish(EscrowEvent::Sync(SyncEvent::SigningQueueRefreshed {
				request_count,
			}))
			.ok();
		RefreshOutcome::Applied(request_count)
	}
}

#[async_trait]
impl Resync for PollingSynchronizer {
	async fn refresh_now(&self) -> RefreshReport {
		PollingSynchronizer::refresh_now(self).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::monitoring::scheduler::TokioScheduler;
	use crate::test_utils::{order, partial, utxo, MockBackend, ScriptedBackend};
	use escrow_gateway::GatewayError;
	use escrow_types::{OrderStatus, RequestStatus};

	fn synchronizer(
		backend: &ScriptedBackend,
		options: SyncOptions,
	) -> (Arc<PollingSynchronizer>, Arc<SyncContext>, EventBus) {
		let context = Arc::new(SyncContext::new());
		let event_bus = EventBus::new(64);
		let synchronizer = Arc::new(PollingSynchronizer::new(
			backend.service(),
			context.clone(),
			event_bus.clone(),
			options,
		));
		(synchronizer, context, event_bus)
	}

	fn ids(orders: &[escrow_types::Order]) -> Vec<&str> {
		orders.iter().map(|o| o.order_id.as_str()).collect()
	}

	#[tokio::test]
	async fn test_refresh_replaces_every_channel() {
		let backend = ScriptedBackend::default();
		backend.set_orders(OrderCategory::Pending, vec![order("1", OrderStatus::PendingPayment)]);
		backend.set_orders(
			OrderCategory::Outstanding,
			vec![order("2", OrderStatus::PendingResponse)],
		);
		backend.set_orders(
			OrderCategory::Completed,
			vec![order("3", OrderStatus::Completed), order("4", OrderStatus::Refunded)],
		);
		backend.set_evidence(vec![utxo("2", "0xpay2", 0)], vec![partial("2", "0xpay2", 0)]);

		let (synchronizer, context, _) = synchronizer(&backend, SyncOptions::default());
		let report = synchronizer.refresh_now().await;

		assert!(report.is_complete());
		assert_eq!(report.completed, RefreshOutcome::Applied(2));
		assert_eq!(ids(&context.pending.latest()), vec!["1"]);
		assert_eq!(ids(&context.outstanding.latest()), vec!["2"]);
		assert_eq!(ids(&context.completed.latest()), vec!["3", "4"]);

		let queue = context.signing_queue.latest();
		assert_eq!(queue.len(), 1);
		assert_eq!(queue[0].status, RequestStatus::MultisigInProgress);
	}

	#[tokio::test]
	async fn test_failed_category_keeps_previous_snapshot() {
		let backend = ScriptedBackend::default();
		backend.set_orders(OrderCategory::Pending, vec![order("1", OrderStatus::PendingPayment)]);
		backend.set_orders(
			OrderCategory::Outstanding,
			vec![order("2", OrderStatus::PendingResponse)],
		);
		let (synchronizer, context, event_bus) = synchronizer(&backend, SyncOptions::default());
		synchronizer.refresh_now().await;

		backend.queue(
			OrderCategory::Pending,
			Duration::ZERO,
			Err(GatewayError::Transport("connection reset".to_string())),
		);
		backend.set_orders(
			OrderCategory::Outstanding,
			vec![
				order("2", OrderStatus::PendingResponse),
				order("5", OrderStatus::PendingResponse),
			],
		);
		let mut events = event_bus.subscribe();

		let report = synchronizer.refresh_now().await;

		assert!(matches!(report.pending, RefreshOutcome::Failed(ref e) if e.contains("connection reset")));
		assert_eq!(report.outstanding, RefreshOutcome::Applied(2));
		assert!(!report.is_complete());
		assert_eq!(ids(&context.pending.latest()), vec!["1"]);
		assert_eq!(ids(&context.outstanding.latest()), vec!["2", "5"]);

		let mut saw_failure = false;
		while let Ok(event) = events.try_recv() {
			if let EscrowEvent::Sync(SyncEvent::RefreshFailed { category, .. }) = event {
				assert_eq!(category, OrderCategory::Pending);
				saw_failure = true;
			}
		}
		assert!(saw_failure);
	}

	#[tokio::test]
	async fn test_malformed_snapshot_is_not_published() {
		let backend = ScriptedBackend::default();
		backend.set_orders(
			OrderCategory::Completed,
			vec![order("3", OrderStatus::Delivering)],
		);
		let (synchronizer, context, _) = synchronizer(&backend, SyncOptions::default());

		let report = synchronizer.refresh_now().await;

		assert!(matches!(report.completed, RefreshOutcome::Failed(_)));
		assert!(context.completed.latest().is_empty());
		assert_eq!(context.completed.version(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_late_response_does_not_overwrite_newer() {
		let backend = ScriptedBackend::default();
		backend.queue(
			OrderCategory::Outstanding,
			Duration::from_secs(5),
			Ok(vec![order("old", OrderStatus::PendingResponse)]),
		);
		backend.queue(
			OrderCategory::Outstanding,
			Duration::from_secs(1),
			Ok(vec![order("new", OrderStatus::PendingResponse)]),
		);
		let (synchronizer, context, _) = synchronizer(&backend, SyncOptions::default());

		let (first, second) = tokio::join!(synchronizer.refresh_now(), async {
			tokio::time::sleep(Duration::from_millis(10)).await;
			synchronizer.refresh_now().await
		});

		assert_eq!(first.outstanding, RefreshOutcome::Stale);
		assert_eq!(second.outstanding, RefreshOutcome::Applied(1));
		assert_eq!(ids(&context.outstanding.latest()), vec!["new"]);
	}

	#[tokio::test]
	async fn test_strict_policy_fails_signing_queue() {
		let backend = ScriptedBackend::default();
		backend.set_evidence(
			vec![utxo("1", "a", 0)],
			vec![partial("1", "a", 0), partial("1", "a", 0)],
		);
		let options = SyncOptions {
			match_policy: MatchPolicy::Strict,
			..SyncOptions::default()
		};
		let (synchronizer, context, _) = synchronizer(&backend, options);

		let report = synchronizer.refresh_now().await;

		assert!(matches!(report.signing_queue, Some(RefreshOutcome::Failed(_))));
		assert!(report.pending.is_applied());
		assert!(context.signing_queue.latest().is_empty());
	}

	#[tokio::test]
	async fn test_failed_evidence_read_keeps_previous_queue() {
		let backend = ScriptedBackend::default();
		backend.set_evidence(vec![utxo("1", "a", 0)], vec![partial("1", "a", 0)]);
		let (synchronizer, context, event_bus) = synchronizer(&backend, SyncOptions::default());
		synchronizer.refresh_now().await;
		let version = context.signing_queue.version();
		assert_eq!(version, 1);

		backend.set_evidence(vec![utxo("1", "a", 0), utxo("2", "b", 0)], Vec::new());
		backend.fail_partials(Some("connection reset"));
		let mut events = event_bus.subscribe();

		let report = synchronizer.refresh_now().await;

		assert!(matches!(report.signing_queue, Some(RefreshOutcome::Failed(ref e)) if e.contains("connection reset")));
		assert!(report.outstanding.is_applied());
		assert_eq!(context.signing_queue.version(), version);
		let queue = context.signing_queue.latest();
		assert_eq!(queue.len(), 1);
		assert_eq!(queue[0].status, RequestStatus::MultisigInProgress);

		let mut saw_failure = false;
		while let Ok(event) = events.try_recv() {
			if matches!(event, EscrowEvent::Sync(SyncEvent::SigningQueueFailed { .. })) {
				saw_failure = true;
			}
		}
		assert!(saw_failure);
	}

	#[tokio::test]
	async fn test_strict_rejection_keeps_previous_queue() {
		let backend = ScriptedBackend::default();
		backend.set_evidence(vec![utxo("1", "a", 0)], Vec::new());
		let options = SyncOptions {
			match_policy: MatchPolicy::Strict,
			..SyncOptions::default()
		};
		let (synchronizer, context, _) = synchronizer(&backend, options);
		synchronizer.refresh_now().await;
		assert_eq!(context.signing_queue.latest()[0].status, RequestStatus::Pending);
		let version = context.signing_queue.version();

		backend.set_evidence(
			vec![utxo("1", "a", 0)],
			vec![partial("1", "a", 0), partial("1", "a", 0)],
		);
		let report = synchronizer.refresh_now().await;

		assert!(matches!(report.signing_queue, Some(RefreshOutcome::Failed(_))));
		assert_eq!(context.signing_queue.version(), version);
		assert_eq!(context.signing_queue.latest()[0].status, RequestStatus::Pending);
	}

	#[tokio::test]
	async fn test_first_match_policy_accepts_duplicates() {
		let backend = ScriptedBackend::default();
		backend.set_evidence(
			vec![utxo("1", "a", 0), utxo("2", "b", 0)],
			vec![partial("1", "a", 0), partial("1", "a", 0)],
		);
		let (synchronizer, context, _) = synchronizer(&backend, SyncOptions::default());

		let report = synchronizer.refresh_now().await;

		assert_eq!(report.signing_queue, Some(RefreshOutcome::Applied(2)));
		let statuses: Vec<_> = context
			.signing_queue
			.latest()
			.iter()
			.map(|r| r.status)
			.collect();
		assert_eq!(
			statuses,
			vec![RequestStatus::MultisigInProgress, RequestStatus::Pending]
		);
	}

	#[tokio::test]
	async fn test_signing_queue_disabled_skips_evidence_reads() {
		let mut backend = MockBackend::new();
		backend
			.expect_fetch_orders()
			.times(3)
			.returning(|_| Ok(Vec::new()));
		backend.expect_fetch_multi_sig_utxos().never();
		backend.expect_fetch_partially_signed_transactions().never();

		let options = SyncOptions {
			signing_queue: false,
			..SyncOptions::default()
		};
		let synchronizer = PollingSynchronizer::new(
			Arc::new(GatewayService::new(Box::new(backend))),
			Arc::new(SyncContext::new()),
			EventBus::new(16),
			options,
		);

		let report = synchronizer.refresh_now().await;
		assert_eq!(report.signing_queue, None);
		assert!(report.is_complete());
	}

	#[tokio::test(start_paused = true)]
	async fn test_polling_continues_after_failures() {
		let backend = ScriptedBackend::default();
		backend.queue(
			OrderCategory::Pending,
			Duration::ZERO,
			Err(GatewayError::Transport("backend down".to_string())),
		);
		backend.set_orders(OrderCategory::Pending, vec![order("1", OrderStatus::PendingPayment)]);
		let options = SyncOptions {
			interval: Duration::from_secs(2),
			..SyncOptions::default()
		};
		let (synchronizer, context, _) = synchronizer(&backend, options);

		let _handle = synchronizer.start(&TokioScheduler);

		tokio::time::sleep(Duration::from_millis(100)).await;
		assert!(context.pending.latest().is_empty());
		assert_eq!(backend.order_reads(), 3);

		tokio::time::sleep(Duration::from_secs(2)).await;
		assert_eq!(ids(&context.pending.latest()), vec!["1"]);
		assert_eq!(backend.order_reads(), 6);
	}
}
