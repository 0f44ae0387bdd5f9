//! The signal queue between host callbacks and the consumer.
//!
//! Host callbacks may fire on any thread. They only push [`Signal`]s; one
//! consumer at a time pops and applies them, so metric and error state is
//! never mutated concurrently.

use tokio::sync::mpsc::{self, error::TryRecvError};

use vigil_core::{EntryType, PerformanceEntry};

use crate::errors::ErrorReport;

/// A unit of work for the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// A batch of entries delivered for one category.
    Batch {
        /// Category the batch was delivered for.
        entry_type: EntryType,
        /// Entries in host delivery order.
        entries: Vec<PerformanceEntry>,
    },
    /// An error report to append.
    Error(ErrorReport),
    /// Empty the error history.
    ClearErrors,
}

/// Producer side of the queue.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<Signal>,
}

impl SignalSender {
    /// Push a signal. Returns `false` once the consumer side is gone.
    pub fn send(&self, signal: Signal) -> bool {
        self.tx.send(signal).is_ok()
    }
}

/// Consumer side of the queue.
#[derive(Debug)]
pub struct SignalQueue {
    rx: mpsc::UnboundedReceiver<Signal>,
}

impl SignalQueue {
    /// Pop the next signal without waiting.
    pub fn try_next(&mut self) -> Option<Signal> {
        match self.rx.try_recv() {
            Ok(signal) => Some(signal),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Create a connected sender and queue.
pub fn channel() -> (SignalSender, SignalQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSender { tx }, SignalQueue { rx })
}
