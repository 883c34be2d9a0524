use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use insightio_common::{Ack, Event, Status};

use super::queue::EventSender;

pub const MSG_EVENT_MISSING: &str = "Event or event type is missing";
pub const MSG_EVENT_RECEIVED: &str = "Event received successfully";
pub const MSG_STREAM_RECEIVED: &str = "Stream received successfully";

/// Ingestion entry point: validates event shape and enqueues for the worker.
///
/// Events without a type are rejected with a negative [`Ack`] (unary) or
/// skipped (stream); neither is an error.
#[derive(Debug, Clone)]
pub struct IngestService {
    queue: EventSender,
}

impl IngestService {
    pub fn new(queue: EventSender) -> Self {
        Self { queue }
    }

    /// Accepts a single event.
    ///
    /// Waits for queue space when the queue is full. The only error is a
    /// closed queue, reported as `unavailable`.
    pub async fn send_event(&self, event: Event) -> Result<Ack, Status> {
        if !event.has_type() {
            debug!("Rejecting event without type");
            return Ok(Ack::rejected(MSG_EVENT_MISSING));
        }

        self.queue.send(event).await?;
        Ok(Ack::accepted(MSG_EVENT_RECEIVED))
    }

    /// Accepts a stream of events, acknowledging once at end of stream.
    ///
    /// Events without a type are skipped. The first stream error aborts the
    /// call with that error; events enqueued before it stay enqueued.
    pub async fn send_event_stream<S>(&self, events: S) -> Result<Ack, Status>
    where
        S: Stream<Item = Result<Event, Status>>,
    {
        let mut events = std::pin::pin!(events);
        let mut accepted = 0u64;
        let mut skipped = 0u64;

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(status) => {
                    warn!(accepted, error = %status, "Event stream aborted");
                    return Err(status);
                }
            };

            if !event.has_type() {
                debug!("Skipping event with missing type");
                skipped += 1;
                continue;
            }

            self.queue.send(event).await?;
            accepted += 1;
        }

        info!(accepted, skipped, "Received events in stream");
        Ok(Ack::accepted(MSG_STREAM_RECEIVED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::queue::event_queue;
    use futures::stream;
    use insightio_common::Code;

    #[tokio::test]
    async fn test_send_event_enqueues() {
        let (tx, mut rx) = event_queue(4);
        let service = IngestService::new(tx);

        let ack = service.send_event(Event::new("page_view")).await.unwrap();
        assert_eq!(ack, Ack::accepted(MSG_EVENT_RECEIVED));
        assert_eq!(rx.recv().await.unwrap().event_type, "page_view");
    }

    #[tokio::test]
    async fn test_send_event_without_type_is_rejected() {
        let (tx, rx) = event_queue(4);
        let service = IngestService::new(tx);

        let ack = service.send_event(Event::default()).await.unwrap();
        assert_eq!(ack, Ack::rejected(MSG_EVENT_MISSING));
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn test_send_event_with_closed_queue() {
        let (tx, rx) = event_queue(4);
        drop(rx);
        let service = IngestService::new(tx);

        let status = service.send_event(Event::new("x")).await.unwrap_err();
        assert_eq!(status.code, Code::Unavailable);
    }

    #[tokio::test]
    async fn test_stream_skips_untyped_events() {
        let (tx, mut rx) = event_queue(8);
        let service = IngestService::new(tx);

        let events = stream::iter(vec![
            Ok(Event::new("a")),
            Ok(Event::default()),
            Ok(Event::new("b")),
        ]);
        let ack = service.send_event_stream(events).await.unwrap();
        assert_eq!(ack, Ack::accepted(MSG_STREAM_RECEIVED));

        assert_eq!(rx.len(), 2);
        assert_eq!(rx.recv().await.unwrap().event_type, "a");
        assert_eq!(rx.recv().await.unwrap().event_type, "b");
    }

    #[tokio::test]
    async fn test_empty_stream_is_acknowledged() {
        let (tx, _rx) = event_queue(1);
        let service = IngestService::new(tx);

        let ack = service
            .send_event_stream(stream::empty::<Result<Event, Status>>())
            .await
            .unwrap();
        assert!(ack.ok);
    }

    #[tokio::test]
    async fn test_stream_error_aborts_call() {
        let (tx, rx) = event_queue(8);
        let service = IngestService::new(tx);

        let events = stream::iter(vec![
            Ok(Event::new("a")),
            Err(Status::invalid_argument("malformed line")),
            Ok(Event::new("never")),
        ]);
        let status = service.send_event_stream(events).await.unwrap_err();
        assert_eq!(status, Status::invalid_argument("malformed line"));
        assert_eq!(rx.len(), 1);
    }
}
