use std::sync::Arc;

use insightio_metrics::MetricStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::queue::EventReceiver;

/// Single consumer draining the event queue into the metric store.
///
/// Events are aggregated exactly once, in queue order. Anything still
/// queued when the worker stops is never aggregated, and the queue stays
/// open: with producers still alive, later sends wait once it is full.
/// Nothing is persisted.
pub struct IngestWorker {
    receiver: EventReceiver,
    store: Arc<MetricStore>,
    stop: watch::Receiver<bool>,
    stop_tx: watch::Sender<bool>,
}

impl IngestWorker {
    pub fn new(receiver: EventReceiver, store: Arc<MetricStore>) -> Self {
        let (stop_tx, stop) = watch::channel(false);
        Self {
            receiver,
            store,
            stop,
            stop_tx,
        }
    }

    /// Starts the worker loop on the current tokio runtime.
    pub fn spawn(self) -> WorkerHandle {
        let stop = self.stop_tx.clone();
        let task = tokio::spawn(self.run());
        WorkerHandle { stop, task }
    }

    /// Runs until stopped or until every producer has been dropped.
    ///
    /// # Returns
    ///
    /// The number of events aggregated.
    pub async fn run(mut self) -> u64 {
        info!("Ingestion worker started");
        let mut processed = 0u64;

        loop {
            tokio::select! {
                event = self.receiver.recv() => match event {
                    Some(event) => {
                        self.store.add_event(&event.event_type);
                        processed += 1;
                    }
                    None => {
                        info!(processed, "Event queue closed, ingestion worker stopping");
                        break;
                    }
                },
                changed = self.stop.changed() => {
                    // A dropped stop sender is treated the same as a stop request.
                    if changed.is_err() || *self.stop.borrow() {
                        info!(processed, pending = self.receiver.len(), "Ingestion worker stopped");
                        break;
                    }
                }
            }
        }

        debug!(processed, "Ingestion worker exited");
        processed
    }
}

/// Handle to a running [`IngestWorker`].
#[derive(Debug)]
pub struct WorkerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl WorkerHandle {
    /// Signals the worker to exit after the event it is processing.
    ///
    /// Calling this more than once is harmless.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// # Returns
    ///
    /// The number of events the worker aggregated, or 0 if the task panicked.
    pub async fn shutdown(self) -> u64 {
        self.stop();
        self.task.await.unwrap_or_default()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
