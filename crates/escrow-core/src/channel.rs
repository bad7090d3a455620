//! Observable snapshot channels.
//!
//! A [`SnapshotChannel`] holds the latest known value of one collection and
//! notifies subscribers whenever it is replaced. Values are swapped whole;
//! readers always get a complete snapshot and never a partially updated one.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type Handler<T> = Arc<dyn Fn(&Arc<T>) + Send + Sync>;

/// Token returned by [`SnapshotChannel::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

struct Versioned<T> {
	version: u64,
	value: Arc<T>,
}

/// Named, replaceable, observable holder of the latest value.
///
/// Reads are lock-free. Publishes and the notifications they trigger are
/// serialized per channel, so every subscriber observes versions in the
/// order they were applied. Handlers run on the publishing task and must not
/// publish into the channel they observe.
pub struct SnapshotChannel<T> {
	name: &'static str,
	current: ArcSwap<Versioned<T>>,
	subscribers: DashMap<u64, Handler<T>>,
	next_token: AtomicU64,
	publish_lock: Mutex<()>,
}

impl<T: Send + Sync + 'static> SnapshotChannel<T> {
	/// Creates a channel holding `initial` at version 0.
	pub fn new(name: &'static str, initial: T) -> Self {
		Self {
			name,
			current: ArcSwap::from_pointee(Versioned {
				version: 0,
				value: Arc::new(initial),
			}),
			subscribers: DashMap::new(),
			next_token: AtomicU64::new(0),
			publish_lock: Mutex::new(()),
		}
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Returns the latest value.
	pub fn latest(&self) -> Arc<T> {
		self.current.load().value.clone()
	}

	/// Returns the version of the latest value. Starts at 0.
	pub fn version(&self) -> u64 {
		self.current.load().version
	}

	/// Replaces the value unconditionally, bumping the version by one.
	pub fn publish(&self, value: impl Into<Arc<T>>) {
		let _guard = self.lock();
		let version = self.current.load().version + 1;
		self.apply(version, value.into());
	}

	/// Replaces the value only if `version` is newer than the held one.
	///
	/// Returns false when the value was discarded as stale.
	pub fn publish_versioned(&self, version: u64, value: impl Into<Arc<T>>) -> bool {
		let _guard = self.lock();
		if version <= self.current.load().version {
			return false;
		}
		self.apply(version, value.into());
		true
	}

	/// Replaces the value only if `guard` holds at the moment of publishing.
	///
	/// The guard is evaluated under the publish lock, so no other publish can
	/// interleave between the check and the swap.
	pub fn publish_when(&self, value: impl Into<Arc<T>>, guard: impl FnOnce() -> bool) -> bool {
		let _guard = self.lock();
		if !guard() {
			return false;
		}
		let version = self.current.load().version + 1;
		self.apply(version, value.into());
		true
	}

	/// Registers `handler` to be called with every future value.
	pub fn subscribe<F>(&self, handler: F) -> SubscriptionToken
	where
		F: Fn(&Arc<T>) + Send + Sync + 'static,
	{
		let token = self.next_token.fetch_add(1, Ordering::Relaxed);
		self.subscribers.insert(token, Arc::new(handler));
		SubscriptionToken(token)
	}

	/// Registers `handler` and immediately calls it with the latest value.
	///
	/// Registration and replay happen under the publish lock: the handler
	/// sees the current value first and then every later one, with nothing
	/// missed or reordered in between.
	pub fn subscribe_with_current<F>(&self, handler: F) -> SubscriptionToken
	where
		F: Fn(&Arc<T>) + Send + Sync + 'static,
	{
		let _guard = self.lock();
		let handler: Handler<T> = Arc::new(handler);
		let token = self.next_token.fetch_add(1, Ordering::Relaxed);
		self.subscribers.insert(token, handler.clone());
		handler(&self.current.load().value);
		SubscriptionToken(token)
	}

	/// Removes a subscription. Returns false if the token was unknown.
	pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
		self.subscribers.remove(&token.0).is_some()
	}

	pub fn subscriber_count(&self) -> usize {
		self.subscribers.len()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
		self.publish_lock
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}

	/// Swaps in the new value and notifies subscribers. Caller holds the lock.
	fn apply(&self, version: u64, value: Arc<T>) {
		self.current.store(Arc::new(Versioned {
			version,
			value: value.clone(),
		}));

		// Handlers may unsubscribe themselves; never call them while holding
		// a map shard.
		let handlers: Vec<Handler<T>> = self
			.subscribers
			.iter()
			.map(|entry| entry.value().clone())
			.collect();

		for handler in handlers {
			handler(&value);
		}

		tracing::trace!(
			channel = self.name,
			version,
			subscribers = self.subscribers.len(),
			"Snapshot replaced"
		);
	}
}

impl<T: Default + Send + Sync + 'static> SnapshotChannel<T> {
	/// Creates a channel holding `T::default()` at version 0.
	pub fn empty(name: &'static str) -> Self {
		Self::new(name, T::default())
	}
}
