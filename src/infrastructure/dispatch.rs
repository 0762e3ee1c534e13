//! UI dispatcher implementations.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

use crate::domain::ports::{UiDispatcher, UiJob};

/// Runs every job immediately on the calling thread.
///
/// Suitable for hosts whose slots are safe to mutate from any thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl UiDispatcher for InlineDispatcher {
    fn dispatch(&self, job: UiJob) {
        job();
    }
}

/// Queues jobs for a UI loop that drains them with a [`UiQueue`].
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<UiJob>,
}

impl ChannelDispatcher {
    /// Creates a dispatcher and the queue its jobs land in.
    #[must_use]
    pub fn new() -> (Self, UiQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, UiQueue { rx })
    }
}

impl UiDispatcher for ChannelDispatcher {
    fn dispatch(&self, job: UiJob) {
        if self.tx.send(job).is_err() {
            trace!("UI queue closed, dropping job");
        }
    }
}

/// Receiving end of a [`ChannelDispatcher`], owned by the UI loop.
pub struct UiQueue {
    rx: mpsc::UnboundedReceiver<UiJob>,
}

impl std::fmt::Debug for UiQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiQueue")
            .field("queued", &self.rx.len())
            .finish()
    }
}

impl UiQueue {
    /// Runs every job already queued. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            count += 1;
        }
        count
    }

    /// Waits for the next job and runs it.
    /// Returns false once every dispatcher is gone.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs jobs as they arrive until none shows up for `idle`.
    /// Returns how many ran.
    pub async fn run_until_idle(&mut self, idle: Duration) -> usize {
        let mut count = 0;
        while let Ok(Some(job)) = tokio::time::timeout(idle, self.rx.recv()).await {
            job();
            count += 1;
        }
        count
    }

    /// Returns the number of queued jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if no job is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
