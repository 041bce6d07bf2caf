use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::cache::Recycle;
use crate::pool::PoolInner;
use crate::task::TaskCell;

/// Message delivered through a worker's mailbox.
pub(crate) enum Mail {
    /// Execute the contained task.
    Run(TaskCell),
    /// Leave the loop and return to the free-list.
    Exit,
}

/// A worker's single-slot channel. The pair is recycled as a unit so a
/// reused mailbox is always a matched, empty channel.
pub(crate) struct Mailbox {
    pub(crate) tx: mpsc::Sender<Mail>,
    pub(crate) rx: mpsc::Receiver<Mail>,
}

impl Default for Mailbox {
    fn default() -> Self {
        // Single slot: the submitter hands off and returns without waiting
        // for the worker to actually start.
        let (tx, rx) = mpsc::channel(1);
        Self { tx, rx }
    }
}

impl Recycle for Mailbox {
    fn recycle(&mut self) {
        // A terminated worker has consumed everything it was sent; drain
        // anyway so a recycled mailbox can never replay stale mail.
        while self.rx.try_recv().is_ok() {}
    }
}

/// Decision taken by the pool when a worker reports completion.
pub(crate) enum DoneAction {
    /// Run the oldest pending task on this worker.
    RunNext(TaskCell),
    /// Hand the oldest pending task to a fresh worker; this one terminates.
    Replace(TaskCell),
    /// Park as idle and wait for the next delivery.
    Park,
    /// Terminate and recycle.
    Exit,
}

/// Spawns a worker around a recycled (or fresh) mailbox and returns the
/// sender half for task delivery.
pub(crate) fn spawn(pool: &Arc<PoolInner>) -> mpsc::Sender<Mail> {
    let mailbox = pool.worker_cache.acquire();
    let tx = mailbox.tx.clone();
    tokio::spawn(run(Arc::downgrade(pool), mailbox));
    tx
}

/// Worker loop: Spawned -> Assigned -> Running -> (Idle | Terminated).
///
/// Holds only a weak back-reference so parked workers cannot keep a dropped
/// pool alive.
async fn run(pool: Weak<PoolInner>, mut mailbox: Mailbox) {
    tracing::trace!("worker spawned");

    'live: while let Some(mail) = mailbox.rx.recv().await {
        let mut cell = match mail {
            Mail::Run(cell) => cell,
            Mail::Exit => break,
        };
        loop {
            let Some(pool) = pool.upgrade() else {
                // Pool dropped out from under us; nothing left to report to.
                return;
            };

            // Capture the job and recycle the descriptor before running it.
            let job = cell.job.take();
            pool.task_cache.release(cell);

            let crashed = match job {
                Some(job) => match AssertUnwindSafe(job).catch_unwind().await {
                    Ok(()) => {
                        pool.note_completed();
                        false
                    }
                    Err(payload) => {
                        pool.note_panicked(payload);
                        true
                    }
                },
                // Empty descriptors are never dispatched; treat as a no-op.
                None => false,
            };

            match pool.on_worker_done(&mailbox.tx, crashed) {
                DoneAction::RunNext(next) => cell = next,
                DoneAction::Replace(next) => {
                    pool.respawn_for(next).await;
                    break 'live;
                }
                DoneAction::Park => continue 'live,
                DoneAction::Exit => break 'live,
            }
        }
    }

    tracing::trace!("worker terminated");
    if let Some(pool) = pool.upgrade() {
        pool.worker_cache.release(mailbox);
    }
}
