//! Event bus for broadcasting engine events.
//!
//! Built on a tokio broadcast channel: every subscriber receives every event
//! published after it subscribed. Publishing with no subscribers is not an
//! error worth handling, so callers usually discard the result with `.ok()`.

use escrow_types::EscrowEvent;
use tokio::sync::broadcast;

/// Cloneable handle to the shared broadcast channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<EscrowEvent>,
}

impl EventBus {
	/// Creates a bus that buffers up to `capacity` events per lagging receiver.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<EscrowEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event, returning the number of receivers reached.
	pub fn publish(
		&self,
		event: EscrowEvent,
	) -> Result<usize, broadcast::error::SendError<EscrowEvent>> {
		self.sender.send(event)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use escrow_types::{OrderCategory, SyncEvent};

	#[tokio::test]
	async fn test_subscribers_receive_published_events() {
		let bus = EventBus::new(8);
		let mut receiver = bus.subscribe();

		let reached = bus
			.publish(EscrowEvent::Sync(SyncEvent::SnapshotRefreshed {
				category: OrderCategory::Pending,
				order_count: 3,
			}))
			.unwrap();
		assert_eq!(reached, 1);

		match receiver.recv().await.unwrap() {
			EscrowEvent::Sync(SyncEvent::SnapshotRefreshed { order_count, .. }) => {
				assert_eq!(order_count, 3)
			},
			other => panic!("unexpected event: {other:?}"),
		}
	}

	#[test]
	fn test_publish_without_subscribers_fails_softly() {
		let bus = EventBus::new(8);
		let result = bus.publish(EscrowEvent::Sync(SyncEvent::SigningQueueRefreshed {
			request_count: 0,
		}));
		assert!(result.is_err());
	}
}
