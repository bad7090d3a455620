//! Escrow engine tying the synchronizer, the view selector and the action
//! dispatcher together.
//!
//! The engine owns the shared [`SyncContext`] and the [`EventBus`]. Its run
//! loop starts periodic polling, activates the configured initial view and
//! logs engine events until shutdown.

pub mod context;
pub mod event_bus;

use crate::handlers::ActionDispatcher;
use crate::monitoring::{PollingSynchronizer, TokioScheduler};
use crate::routing::ViewSelector;
use context::SyncContext;
use escrow_config::Config;
use escrow_gateway::GatewayService;
use escrow_types::{truncate_id, ActionEvent, EscrowEvent, SyncEvent, ViewEvent};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Service error: {0}")]
	Service(String),
}

/// The composed order dashboard engine.
#[derive(Clone)]
pub struct EscrowEngine {
	pub(crate) config: Config,
	pub(crate) gateway: Arc<GatewayService>,
	pub(crate) context: Arc<SyncContext>,
	pub(crate) event_bus: event_bus::EventBus,
	pub(crate) synchronizer: Arc<PollingSynchronizer>,
	pub(crate) selector: Arc<ViewSelector>,
	pub(crate) dispatcher: Arc<ActionDispatcher>,
}

impl EscrowEngine {
	/// Wires the components around an existing gateway.
	pub fn new(config: Config, gateway: Arc<GatewayService>, event_bus: event_bus::EventBus) -> Self {
		let context = Arc::new(SyncContext::new());

		let synchronizer = Arc::new(PollingSynchronizer::new(
			gateway.clone(),
			context.clone(),
			event_bus.clone(),
			(&config.sync).into(),
		));

		let selector = Arc::new(ViewSelector::new(context.clone(), event_bus.clone()));

		let dispatcher = Arc::new(ActionDispatcher::new(
			gateway.clone(),
			synchronizer.clone(),
			event_bus.clone(),
		));

		Self {
			config,
			gateway,
			context,
			event_bus,
			synchronizer,
			selector,
			dispatcher,
		}
	}

	/// Main loop of the engine. Returns on Ctrl+C, or with an error if the
	/// shutdown signal cannot be listened for.
	pub async fn run(&self) -> Result<(), EngineError> {
		let mut event_receiver = self.event_bus.subscribe();

		let polling = self.synchronizer.start(&TokioScheduler);

		if let Some(category) = self.config.service.initial_view {
			self.selector.activate(category);
		}

		loop {
			tokio::select! {
				event = event_receiver.recv() => {
					match event {
						Ok(event) => log_event(&event),
						Err(RecvError::Lagged(skipped)) => {
							tracing::warn!(skipped, "Event log fell behind");
						}
						Err(RecvError::Closed) => break,
					}
				}

				// Shutdown signal
				signal = tokio::signal::ctrl_c() => {
					if let Err(e) = signal {
						polling.cancel();
						return Err(EngineError::Service(format!(
							"Failed to listen for shutdown signal: {}",
							e
						)));
					}
					break;
				}
			}
		}

		polling.cancel();
		Ok(())
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns the snapshot channels.
	pub fn context(&self) -> &Arc<SyncContext> {
		&self.context
	}

	/// Returns the gateway service.
	pub fn gateway(&self) -> &Arc<GatewayService> {
		&self.gateway
	}

	/// Returns the polling synchronizer.
	pub fn synchronizer(&self) -> &Arc<PollingSynchronizer> {
		&self.synchronizer
	}

	/// Returns the view selector.
	pub fn selector(&self) -> &Arc<ViewSelector> {
		&self.selector
	}

	/// Returns the action dispatcher.
	pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
		&self.dispatcher
	}
}

fn log_event(event: &EscrowEvent) {
	match event {
		EscrowEvent::Sync(SyncEvent::SnapshotDiscarded { category, version }) => {
			tracing::debug!(category = %category, version, "Stale snapshot discarded");
		},
		EscrowEvent::Sync(SyncEvent::SigningQueueRefreshed { request_count }) => {
			tracing::trace!(request_count, "Signing queue refreshed");
		},
		EscrowEvent::View(ViewEvent::Activated { category, .. }) => {
			tracing::debug!(category = %category, "Active view changed");
		},
		EscrowEvent::Action(ActionEvent::TransitionConfirmed {
			order_id,
			transition,
		}) => {
			tracing::info!(
				order_id = %truncate_id(order_id),
				transition = %transition,
				"Order transitioned"
			);
		},
		EscrowEvent::Action(ActionEvent::TransitionFailed {
			order_id,
			transition,
			error,
		}) => {
			tracing::warn!(
				order_id = %truncate_id(order_id),
				transition = %transition,
				error = %error,
				"Order transition failed"
			);
		},
		_ => {},
	}
}
