//! FIFO queue of callers parked on an in-flight session refresh.
//!
//! # Design
//! Each waiter is the receiving half of a `tokio::sync::oneshot` channel; the
//! queue keeps the sending halves in arrival order. Completing the queue
//! sends one clone of the outcome per waiter, front to back, so every parked
//! caller observes the same value and parked callers are woken in the order
//! they arrived.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use crate::error::ApiError;

/// Outcome of one refresh cycle as seen by a waiter.
pub type RenewalOutcome = Result<(), ApiError>;

/// Pending completions, oldest first.
#[derive(Debug, Default)]
pub struct WaiterQueue {
    pending: VecDeque<oneshot::Sender<RenewalOutcome>>,
}

impl WaiterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a new caller at the back of the queue.
    pub fn enqueue(&mut self) -> Waiter {
        let (tx, rx) = oneshot::channel();
        self.pending.push_back(tx);
        Waiter { rx }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Detach every pending waiter, leaving this queue empty.
    pub fn take(&mut self) -> WaiterQueue {
        std::mem::take(self)
    }

    /// Resolve every waiter with `outcome`, in enqueue order.
    pub fn complete(self, outcome: &RenewalOutcome) {
        for tx in self.pending {
            // The caller behind this waiter was cancelled; nothing to deliver.
            let _ = tx.send(outcome.clone());
        }
    }
}

/// A caller's handle on the outcome of the refresh it is parked behind.
#[derive(Debug)]
pub struct Waiter {
    rx: oneshot::Receiver<RenewalOutcome>,
}

impl Waiter {
    /// Resolves once the queue is completed. A queue dropped without being
    /// completed yields `RefreshAbandoned`.
    pub async fn wait(self) -> RenewalOutcome {
        self.rx.await.unwrap_or(Err(ApiError::RefreshAbandoned))
    }
}
