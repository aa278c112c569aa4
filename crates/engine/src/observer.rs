use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

use common::{ProgressEvent, WorkflowObserver};

/// Events kept for late subscribers.
pub const HISTORY_LEN: usize = 200;

/// Fans progress events out to live subscribers (dashboard WebSocket) and
/// keeps a bounded replay history. Sending with no subscribers is not an error.
pub struct BroadcastObserver {
    tx: broadcast::Sender<ProgressEvent>,
    history: Mutex<VecDeque<ProgressEvent>>,
    capacity: usize,
}

impl BroadcastObserver {
    /// `capacity` 0 disables replay; live subscribers still get every event.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn history_lock(&self) -> MutexGuard<'_, VecDeque<ProgressEvent>> {
        match self.history.lock() {
            Ok(h) => h,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replay history (oldest first) plus a receiver for everything after it.
    /// Taken under the history lock, so each event lands in exactly one of the two.
    pub fn subscribe_with_history(
        &self,
    ) -> (Vec<ProgressEvent>, broadcast::Receiver<ProgressEvent>) {
        let history = self.history_lock();
        (history.iter().cloned().collect(), self.tx.subscribe())
    }
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new(HISTORY_LEN)
    }
}

impl WorkflowObserver for BroadcastObserver {
    fn on_event(&self, event: &ProgressEvent) {
        let mut history = self.history_lock();
        if self.capacity > 0 {
            while history.len() >= self.capacity {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
        let _ = self.tx.send(event.clone());
    }
}

/// Observer that drops every event.
pub struct NullObserver;

impl WorkflowObserver for NullObserver {
    fn on_event(&self, _event: &ProgressEvent) {}
}
