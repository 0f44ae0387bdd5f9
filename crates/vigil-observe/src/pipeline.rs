//! The single-consumer telemetry pipeline.
//!
//! Producers call [`TelemetryPipeline::submit`] from any thread or from
//! inside a sink call. Whoever wins the consumer lock drains the queue to
//! completion; everyone else returns immediately and leaves their signal to
//! the active drainer. State readers see a published copy, so a read never
//! waits on a drain in progress.
//!
//! Reads are read-after-write consistent only when no other drain is
//! running. A reader that finds the consumer busy, whether it is a sink
//! called back mid-drain or another thread, gets the last published copy.
//! Signals the active drainer has yet to apply are missing from it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use vigil_core::MonitorConfig;

use crate::aggregator::MetricAggregator;
use crate::collector::ErrorCollector;
use crate::errors::ErrorReport;
use crate::events::EventDispatcher;
use crate::metrics::WebVitals;
use crate::queue::{channel, Signal, SignalQueue, SignalSender};
use crate::reporting::Reporter;

struct Consumer {
    queue: SignalQueue,
    aggregator: MetricAggregator,
    collector: ErrorCollector,
}

#[derive(Default)]
struct Published {
    metrics: WebVitals,
    errors: Vec<ErrorReport>,
}

/// Queue, aggregator and error collector behind one consumer.
pub struct TelemetryPipeline {
    sender: SignalSender,
    pending: AtomicUsize,
    consumer: Mutex<Consumer>,
    published: RwLock<Published>,
}

impl TelemetryPipeline {
    /// Create a pipeline with empty metric and error state.
    pub fn new(
        config: &MonitorConfig,
        reporter: Arc<Reporter>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        let (sender, queue) = channel();
        let aggregator = MetricAggregator::new(config, Arc::clone(&reporter), Arc::clone(&events));
        Self {
            sender,
            pending: AtomicUsize::new(0),
            consumer: Mutex::new(Consumer {
                queue,
                aggregator,
                collector: ErrorCollector::new(reporter, events),
            }),
            published: RwLock::new(Published::default()),
        }
    }

    /// Queue a signal and drain if no one else is.
    pub fn submit(&self, signal: Signal) {
        self.enqueue(signal);
        self.drain();
    }

    /// Queue a signal without draining.
    pub fn enqueue(&self, signal: Signal) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if !self.sender.send(signal) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Apply every queued signal.
    ///
    /// Returns the number applied by this call; zero when another caller
    /// holds the consumer.
    pub fn drain(&self) -> usize {
        let mut applied = 0;
        loop {
            let Some(mut consumer) = self.consumer.try_lock() else {
                return applied;
            };
            while let Some(signal) = consumer.queue.try_next() {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                self.apply(&mut consumer, signal);
                applied += 1;
            }
            drop(consumer);

            if self.pending.load(Ordering::SeqCst) == 0 {
                return applied;
            }
        }
    }

    fn apply(&self, consumer: &mut Consumer, signal: Signal) {
        match signal {
            Signal::Batch { entry_type, entries } => {
                let updates = consumer.aggregator.ingest(entry_type, &entries);
                trace!(entry_type = %entry_type, updates, "Batch applied");
                if updates > 0 {
                    self.published.write().metrics = consumer.aggregator.metrics();
                }
            }
            Signal::Error(report) => {
                consumer.collector.log_error(report);
                self.published.write().errors = consumer.collector.errors();
            }
            Signal::ClearErrors => {
                consumer.collector.clear();
                self.published.write().errors.clear();
            }
        }
    }

    /// Signals queued but not yet applied.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Current metric map.
    ///
    /// Drains first when the consumer is free; otherwise returns the last
    /// published map.
    pub fn metrics(&self) -> WebVitals {
        self.drain();
        self.published.read().metrics
    }

    /// Current error history, with the same draining rule as
    /// [`metrics`](Self::metrics).
    pub fn errors(&self) -> Vec<ErrorReport> {
        self.drain();
        self.published.read().errors.clone()
    }
}

impl std::fmt::Debug for TelemetryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPipeline")
            .field("pending", &self.pending())
            .finish()
    }
}
