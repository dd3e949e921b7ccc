//! Live feed notifications
//!
//! Mutations publish a [`FeedEvent`] on the [`Hub`]; every open
//! `/live/feed` stream re-renders the home feed when one arrives.
//!
//! Each client owns one [`SubscriptionSlot`] per live container. Opening a
//! new stream releases the previous one first, so a client never has two
//! listeners on the same container.

use crate::model::QuestionId;
use tokio::sync::{broadcast, oneshot};

const CHANNEL_CAPACITY: usize = 64;

/// Something changed that affects the home feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    QuestionCreated(QuestionId),
    CommentAdded(QuestionId),
}

/// Fan-out point for feed events
#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<FeedEvent>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish to every subscriber; no subscribers is not an error
    pub fn publish(&self, event: FeedEvent) {
        let delivered = self.tx.send(event.clone()).unwrap_or(0);
        tracing::debug!(?event, delivered, "Feed event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Handle whose completion tells a stream to stop
pub type Release = oneshot::Receiver<()>;

/// At most one live subscription for one container of one client
#[derive(Debug, Default)]
pub struct SubscriptionSlot {
    current: Option<oneshot::Sender<()>>,
    generation: u64,
}

impl SubscriptionSlot {
    /// Release the previous subscription (if any) and start a new one
    pub fn establish(&mut self) -> Release {
        self.release();
        let (tx, rx) = oneshot::channel();
        self.current = Some(tx);
        self.generation += 1;
        rx
    }

    pub fn release(&mut self) {
        if let Some(previous) = self.current.take() {
            // The stream may already be gone; nothing to do then
            let _ = previous.send(());
            tracing::debug!(generation = self.generation, "Released live subscription");
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// How many subscriptions this slot has handed out
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot::error::TryRecvError;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let hub = Hub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        let event = FeedEvent::QuestionCreated(QuestionId("aZ3kP9qR".into()));
        hub.publish(event.clone());
        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), event);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = Hub::new();
        hub.publish(FeedEvent::CommentAdded(QuestionId("x".into())));
    }

    #[test]
    fn test_new_subscription_releases_previous() {
        let mut slot = SubscriptionSlot::default();
        assert!(!slot.is_active());

        let mut first = slot.establish();
        assert!(slot.is_active());
        assert_eq!(first.try_recv(), Err(TryRecvError::Empty));

        let mut second = slot.establish();
        assert_eq!(first.try_recv(), Ok(()));
        assert_eq!(second.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(slot.generation(), 2);

        slot.release();
        assert_eq!(second.try_recv(), Ok(()));
        assert!(!slot.is_active());
    }

    #[test]
    fn test_dropped_stream_marks_slot_inactive() {
        let mut slot = SubscriptionSlot::default();
        let release = slot.establish();
        drop(release);
        assert!(!slot.is_active());
    }
}
