//! Per-job progress channel.
//!
//! A broadcast channel scoped to one job: the runner publishes without
//! ever blocking, any number of observers subscribe independently, and a
//! reader that falls behind is told how many events it missed instead of
//! silently losing them. An idle blocking read surfaces a heartbeat so a
//! connected observer can tell a quiet job from a dead one.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::types::progress::ProgressEvent;

/// Producer half plus subscription factory for one job's event stream.
#[derive(Clone)]
pub struct ProgressChannel {
    tx: broadcast::Sender<ProgressEvent>,
    heartbeat_interval: Duration,
}

impl ProgressChannel {
    pub fn new(capacity: usize, heartbeat_interval: Duration) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            heartbeat_interval,
        }
    }

    /// Publish an event. Never blocks; a send with no live subscribers is
    /// a no-op.
    pub fn publish(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe from this point forward. Events published before the
    /// subscription are not replayed.
    pub fn subscribe(&self) -> ProgressStream {
        ProgressStream {
            rx: self.tx.subscribe(),
            heartbeat_interval: self.heartbeat_interval,
            pending: None,
            finished: false,
        }
    }

    /// Subscribe with an event already queued for delivery — used to hand
    /// late observers the terminal outcome they missed.
    pub fn subscribe_primed(&self, first: ProgressEvent) -> ProgressStream {
        let mut stream = self.subscribe();
        stream.prime(first);
        stream
    }
}

/// Consumer half of a job's event stream.
pub struct ProgressStream {
    rx: broadcast::Receiver<ProgressEvent>,
    heartbeat_interval: Duration,
    pending: Option<ProgressEvent>,
    finished: bool,
}

impl ProgressStream {
    /// Queue an event for delivery before anything from the channel.
    ///
    /// A terminal event delivered this way ends the stream exactly as a
    /// live one would; if the same terminal event also arrives live, the
    /// duplicate is never yielded.
    pub fn prime(&mut self, event: ProgressEvent) {
        self.pending = Some(event);
    }

    /// Next event, blocking up to the heartbeat interval.
    ///
    /// Yields `Heartbeat` when no event arrives in time, `Lagged` when
    /// the reader fell behind, and `None` after the terminal event has
    /// been delivered (or the producer side is gone).
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        if self.finished {
            return None;
        }
        if let Some(event) = self.pending.take() {
            self.finished = event.is_terminal();
            return Some(event);
        }

        match tokio::time::timeout(self.heartbeat_interval, self.rx.recv()).await {
            Ok(Ok(event)) => {
                self.finished = event.is_terminal();
                Some(event)
            }
            Ok(Err(broadcast::error::RecvError::Lagged(missed))) => {
                Some(ProgressEvent::Lagged { missed })
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => {
                self.finished = true;
                None
            }
            Err(_elapsed) => Some(ProgressEvent::Heartbeat { at: Utc::now() }),
        }
    }
}
