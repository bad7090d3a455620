//! Selection of the operator's active view.
//!
//! The selector forwards exactly one category channel into `current_orders`.
//! Activating a view pulls that category's latest snapshot immediately and
//! then follows its updates; the previously active category stops reaching
//! `current_orders` at the same moment.

use crate::channel::SubscriptionToken;
use crate::engine::{context::SyncContext, event_bus::EventBus};
use escrow_types::{EscrowEvent, Order, OrderCategory, ViewEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Default)]
struct ActiveView {
	category: Option<OrderCategory>,
	subscription: Option<SubscriptionToken>,
}

/// Routes the active category's snapshots into `current_orders`.
pub struct ViewSelector {
	context: Arc<SyncContext>,
	event_bus: EventBus,
	active: Mutex<ActiveView>,
	/// Bumped on every activation. A forward only lands if it was made under
	/// the current epoch.
	epoch: Arc<AtomicU64>,
}

impl ViewSelector {
	pub fn new(context: Arc<SyncContext>, event_bus: EventBus) -> Self {
		Self {
			context,
			event_bus,
			active: Mutex::new(ActiveView::default()),
			epoch: Arc::new(AtomicU64::new(0)),
		}
	}

	/// Returns the active view, `None` before the first activation.
	pub fn active(&self) -> Option<OrderCategory> {
		self.lock().category
	}

	/// Makes `category` the active view.
	///
	/// Returns false without doing anything if it already is. The selector
	/// lock is released before the latest snapshot is replayed into
	/// `current_orders`, so `current_orders` subscribers may query the
	/// selector.
	pub fn activate(&self, category: OrderCategory) -> bool {
		let mut active = self.lock();
		if active.category == Some(category) {
			tracing::trace!(category = %category, "View already active");
			return false;
		}

		let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
		let previous = active.category.replace(category);
		let stale = active.subscription.take();
		drop(active);

		if let (Some(previous), Some(token)) = (previous, stale) {
			self.context.orders(previous).unsubscribe(token);
		}

		let current_orders = self.context.current_orders.clone();
		let current_epoch = self.epoch.clone();
		let source = self.context.orders(category);
		let token = source.subscribe_with_current(move |orders: &Arc<Vec<Order>>| {
			current_orders.publish_when(orders.clone(), || {
				current_epoch.load(Ordering::SeqCst) == epoch
			});
		});

		let mut active = self.lock();
		if self.epoch.load(Ordering::SeqCst) == epoch {
			active.subscription = Some(token);
		} else {
			// Superseded while replaying
			source.unsubscribe(token);
		}
		drop(active);

		tracing::info!(
			previous = ?previous,
			category = %category,
			order_count = self.context.current_orders.latest().len(),
			"View activated"
		);
		self.event_bus
			.publish(EscrowEvent::View(ViewEvent::Activated { previous, category }))
			.ok();
		true
	}

	/// Handles a navigation event.
	///
	/// Routes that show no order list leave the active view unchanged.
	pub fn navigate(&self, route: &str) -> bool {
		match OrderCategory::from_route(route) {
			Some(category) => self.activate(category),
			None => {
				tracing::debug!(route, "Route shows no order view");
				false
			},
		}
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, ActiveView> {
		self.active.lock().unwrap_or_else(PoisonError::into_inner)
	}
}
