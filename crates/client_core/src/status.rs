//! Publishes operation status snapshots to whoever renders them.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::domain::OperationStatus;
use tokio::sync::watch;

pub struct StatusReporter {
    tx: Arc<watch::Sender<OperationStatus>>,
    generation: Arc<AtomicU64>,
    hide_after: Duration,
}

impl StatusReporter {
    pub fn new(hide_after: Duration) -> Self {
        let (tx, _rx) = watch::channel(OperationStatus::hidden());
        Self {
            tx: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
            hide_after,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> OperationStatus {
        self.tx.borrow().clone()
    }

    /// Starts a new workflow's status; any pending auto-hide from an earlier one is dropped.
    pub fn begin(&self, message: &str, percent: u8) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.tx
            .send_replace(OperationStatus::in_progress(message, percent));
    }

    /// Progress never moves backwards within one workflow.
    pub fn progress(&self, message: &str, percent: u8) {
        self.tx.send_modify(|status| {
            let percent = percent.max(status.progress_percent);
            *status = OperationStatus::in_progress(message, percent);
        });
    }

    /// Shows the terminal status, then hides it after the display delay
    /// unless another workflow has begun in the meantime.
    pub fn finish(&self, terminal: OperationStatus) {
        let generation = self.generation.load(Ordering::SeqCst);
        self.tx.send_replace(terminal);

        let tx = Arc::clone(&self.tx);
        let current_generation = Arc::clone(&self.generation);
        let hide_after = self.hide_after;
        tokio::spawn(async move {
            tokio::time::sleep(hide_after).await;
            if current_generation.load(Ordering::SeqCst) == generation {
                tx.send_replace(OperationStatus::hidden());
            }
        });
    }
}
