//! Bounded event queue between a running job and its subscriber
//!
//! The queue applies backpressure: when it is full, the job waits for the
//! subscriber to catch up, so events are never dropped or reordered. If the
//! subscriber side is dropped, the job's cancellation token is triggered.

use crate::job::event::{EventKind, ProgressEvent, Totals};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Creates a progress channel holding at most `buffer` undelivered events
pub fn progress_channel(
    buffer: usize,
    cancel: CancellationToken,
) -> (EventSink, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let sink = EventSink {
        tx,
        next_ordinal: 1,
        cancel,
        connected: true,
    };
    (sink, rx)
}

/// Job-side end of the progress channel; stamps ordinals and timestamps
#[derive(Debug)]
pub struct EventSink {
    tx: mpsc::Sender<ProgressEvent>,
    next_ordinal: u64,
    cancel: CancellationToken,
    connected: bool,
}

impl EventSink {
    /// Sends one event, waiting for queue capacity
    ///
    /// Returns false once the subscriber is gone; the job is then cancelled and
    /// later events are discarded.
    pub async fn emit(
        &mut self,
        kind: EventKind,
        url: &str,
        message: impl Into<String>,
        totals: Totals,
    ) -> bool {
        self.send(kind, url, message.into(), totals, false).await
    }

    /// Sends the final `done` event of a cancelled job
    pub async fn emit_cancelled(&mut self, message: impl Into<String>, totals: Totals) -> bool {
        self.send(EventKind::Done, "", message.into(), totals, true)
            .await
    }

    async fn send(
        &mut self,
        kind: EventKind,
        url: &str,
        message: String,
        totals: Totals,
        cancelled: bool,
    ) -> bool {
        let event = ProgressEvent {
            ordinal: self.next_ordinal,
            url: url.to_string(),
            kind,
            message,
            totals,
            timestamp: Utc::now(),
            cancelled,
        };
        self.next_ordinal += 1;

        if !self.connected {
            return false;
        }

        if self.tx.send(event).await.is_err() {
            tracing::info!("Progress subscriber went away; cancelling job");
            self.connected = false;
            self.cancel.cancel();
        }
        self.connected
    }

    /// Number of events produced so far
    pub fn emitted(&self) -> u64 {
        self.next_ordinal - 1
    }
}
