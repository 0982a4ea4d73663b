//! Multicast event streams.

use std::sync::Mutex;
use tokio::sync::mpsc;

/// Fan-out of events to any number of subscribers.
///
/// Each subscriber gets its own unbounded receiver; events fired before a
/// subscription are not replayed. Subscribers that dropped their receiver
/// are pruned on the next fire.
pub struct EventEmitter<T> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    pub fn fire(&self, event: T) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Drop every subscriber; their streams end after draining.
    pub fn clear(&self) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl<T: Clone> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let emitter = EventEmitter::new();
        let mut a = emitter.subscribe();
        let mut b = emitter.subscribe();
        emitter.fire(1);
        emitter.fire(2);
        assert_eq!(a.recv().await, Some(1));
        assert_eq!(a.recv().await, Some(2));
        assert_eq!(b.recv().await, Some(1));
        assert_eq!(b.recv().await, Some(2));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let emitter = EventEmitter::new();
        let kept = emitter.subscribe();
        drop(emitter.subscribe());
        emitter.fire("x");
        assert_eq!(emitter.subscriber_count(), 1);
        drop(kept);
    }

    #[tokio::test]
    async fn clear_ends_streams_after_buffered_events() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();
        emitter.fire(7);
        emitter.clear();
        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, None);
    }
}
