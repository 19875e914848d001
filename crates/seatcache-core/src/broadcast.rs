//! Typed fan-out of events to any number of listeners.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use crate::detector::ChangeSet;

/// Publishes events of type `T` to every live subscription.
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded;
/// publishers never block.
#[derive(Debug, Clone)]
pub struct Broadcaster<T = ChangeSet> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Send to all current subscribers, returning how many will see it.
    pub fn publish(&self, event: T) -> usize {
        match self.tx.send(event) {
            Ok(delivered) => delivered,
            Err(_) => {
                debug!("No subscribers for event");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub struct Subscription<T> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Next event, or `None` once every broadcaster is gone.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged, dropping oldest events");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of `recv`.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged, dropping oldest events");
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let broadcaster: Broadcaster<u32> = Broadcaster::new(8);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        assert_eq!(broadcaster.subscriber_count(), 2);
        assert_eq!(broadcaster.publish(7), 2);
        assert_eq!(first.recv().await, Some(7));
        assert_eq!(second.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_unsubscribe_and_no_listeners() {
        let broadcaster: Broadcaster<u32> = Broadcaster::new(8);
        assert_eq!(broadcaster.publish(1), 0);

        let sub = broadcaster.subscribe();
        sub.unsubscribe();
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_skips_to_newest() {
        let broadcaster: Broadcaster<u32> = Broadcaster::new(2);
        let mut sub = broadcaster.subscribe();
        for n in 0..5 {
            broadcaster.publish(n);
        }

        assert_eq!(sub.recv().await, Some(3));
        assert_eq!(sub.try_recv(), Some(4));
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn test_closed_channel_ends_stream() {
        let broadcaster: Broadcaster<u32> = Broadcaster::new(2);
        let mut sub = broadcaster.subscribe();
        drop(broadcaster);
        assert_eq!(sub.recv().await, None);
    }
}
