use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use insightio_common::protocol::error::{InsightError, Result};
use insightio_common::Event;

/// Where a dropped [`EventReceiver`] leaves its channel while producers live.
type Parked = Arc<Mutex<Option<mpsc::Receiver<Event>>>>;

/// Creates the bounded event queue connecting ingestion calls to the worker.
///
/// The queue stays open for as long as any producer exists, even after the
/// consumer is gone: once nothing drains it, sends into a full queue wait
/// rather than fail.
///
/// # Arguments
///
/// * `capacity` - Number of events the queue holds before producers wait;
///   must be at least 1
///
/// # Returns
///
/// The producer half (cheap to clone, one per service) and the consumer
/// half (owned by the single [`IngestWorker`](super::IngestWorker))
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let parked: Parked = Arc::new(Mutex::new(None));
    (
        EventSender {
            tx,
            parked: parked.clone(),
        },
        EventReceiver { rx, parked },
    )
}

/// Producer half of the event queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
    parked: Parked,
}

impl EventSender {
    /// Enqueues an event, waiting while the queue is full.
    ///
    /// A queue whose worker has stopped never frees space again, so a send
    /// into it waits until the caller gives up.
    pub async fn send(&self, event: Event) -> Result<()> {
        self.tx.send(event).await.map_err(|_| InsightError::QueueClosed)
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Whether the consumer half has been dropped.
    pub fn is_consumer_gone(&self) -> bool {
        self.parked.lock().map(|slot| slot.is_some()).unwrap_or(true)
    }
}

/// Consumer half of the event queue.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<Event>,
    parked: Parked,
}

impl EventReceiver {
    /// Waits for the next event; `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Number of events waiting to be consumed.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Drop for EventReceiver {
    fn drop(&mut self) {
        // Hand the channel to the producers; it closes when the last one drops.
        let (_, placeholder) = mpsc::channel(1);
        let rx = std::mem::replace(&mut self.rx, placeholder);
        if let Ok(mut slot) = self.parked.lock() {
            *slot = Some(rx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_and_receive_in_order() {
        let (tx, mut rx) = event_queue(4);
        for t in ["a", "b", "c"] {
            tx.send(Event::new(t)).await.unwrap();
        }
        assert_eq!(rx.len(), 3);
        assert_eq!(tx.available(), 1);

        let mut types = vec![];
        for _ in 0..3 {
            types.push(rx.recv().await.unwrap().event_type);
        }
        assert_eq!(types, vec!["a", "b", "c"]);
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_makes_sender_wait() {
        let (tx, mut rx) = event_queue(1);
        tx.send(Event::new("first")).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.send(Event::new("second"))).await;
        assert!(blocked.is_err(), "send into a full queue should wait");

        rx.recv().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), tx.send(Event::new("third")))
            .await
            .expect("send should proceed once space frees up")
            .unwrap();
    }

    #[tokio::test]
    async fn test_queue_stays_open_after_receiver_dropped() {
        let (tx, rx) = event_queue(1);
        assert!(!tx.is_consumer_gone());
        drop(rx);
        assert!(tx.is_consumer_gone());

        // The free slot still accepts an event; after that, sends wait
        tx.send(Event::new("x")).await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.send(Event::new("y"))).await;
        assert!(blocked.is_err(), "send into an undrained queue should wait");
    }

    #[tokio::test]
    async fn test_receiver_ends_when_senders_dropped() {
        let (tx, mut rx) = event_queue(2);
        tx.send(Event::new("x")).await.unwrap();
        drop(tx);
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (tx, _rx) = event_queue(0);
        assert_eq!(tx.max_capacity(), 1);
    }
}
