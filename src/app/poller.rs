//! Receipt confirmation poller.
//!
//! Holds at most one pending one-shot timer. When it fires it posts a
//! [`CoordinatorEvent::PollDue`] back to the coordinator, which decides whether
//! the tick still matters (current attempt, `AwaitingReceipt` phase).

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::app::coordinator::CoordinatorEvent;

/// Default delay between receipt fetches
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(10);

struct PendingPoll {
    attempt: Uuid,
    handle: JoinHandle<()>,
}

pub struct ConfirmationPoller {
    interval: Duration,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    pending: Option<PendingPoll>,
    scheduled: u32,
}

impl ConfirmationPoller {
    #[must_use]
    pub fn new(interval: Duration, events: mpsc::UnboundedSender<CoordinatorEvent>) -> Self {
        Self {
            interval,
            events,
            pending: None,
            scheduled: 0,
        }
    }

    /// Arm a one-shot timer for `attempt`.
    ///
    /// Returns false without arming if a timer for the same attempt is already
    /// pending, so timers never stack.
    pub fn schedule(&mut self, attempt: Uuid, hash: &str) -> bool {
        if self.is_pending_for(attempt) {
            trace!(%attempt, "Receipt poll already pending");
            return false;
        }

        let events = self.events.clone();
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            // The coordinator may be gone; the tick is then meaningless.
            let _ = events.send(CoordinatorEvent::PollDue { attempt });
        });

        self.scheduled += 1;
        debug!(%attempt, hash = %hash, delay_ms = interval.as_millis() as u64, "Receipt poll armed");
        self.pending = Some(PendingPoll { attempt, handle });
        true
    }

    /// Record that the timer for `attempt` fired
    pub fn fired(&mut self, attempt: Uuid) {
        if self.is_pending_for(attempt) {
            self.pending = None;
        }
    }

    /// A timer counts as pending until its tick has been consumed via `fired`
    #[must_use]
    pub fn is_pending_for(&self, attempt: Uuid) -> bool {
        self.pending.as_ref().is_some_and(|p| p.attempt == attempt)
    }

    /// Number of timers armed since the last `reset`
    #[must_use]
    pub fn scheduled(&self) -> u32 {
        self.scheduled
    }

    /// Forget the bookkeeping of a previous attempt. A timer still in flight
    /// fires into a stale attempt id and is ignored by the coordinator.
    pub fn reset(&mut self) {
        self.pending = None;
        self.scheduled = 0;
    }
}

impl Drop for ConfirmationPoller {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
        }
    }
}
