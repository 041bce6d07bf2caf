use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cache::ObjectCache;
use crate::errors::SubmitError;
use crate::model::PoolMetrics;
use crate::task::{Job, TaskCell};
use crate::worker::{self, DoneAction, Mail, Mailbox};

/// Callback invoked with the payload recovered from a panicking task.
pub type PanicHandler = Arc<dyn Fn(Box<dyn Any + Send>) + Send + Sync>;

/// Default number of idle workers retained for reuse.
pub const DEFAULT_IDLE_TARGET: usize = 2;

/// Default interval of the periodic idle reclaimer.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Pool configuration. Out-of-range combinations are normalized at
/// construction, never rejected.
#[derive(Clone)]
pub struct PoolConfig {
    /// Desired number of idle workers retained when no work is pending.
    pub idle_target: usize,
    /// Ceiling on concurrently running workers; 0 means unbounded.
    pub max_workers: usize,
    /// Interval of the periodic idle sweep. `None` (or a zero duration)
    /// disables the sweep; idle trimming then happens lazily on task
    /// completion instead.
    pub sweep_interval: Option<Duration>,
    /// Invoked with the recovered payload when a task panics.
    pub on_panic: Option<PanicHandler>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_target: DEFAULT_IDLE_TARGET,
            max_workers: 0,
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
            on_panic: None,
        }
    }
}

impl PoolConfig {
    /// Preset for CPU-bound tasks: ceiling at the core count.
    pub fn cpu_bound() -> Self {
        Self {
            max_workers: num_cpus::get(),
            ..Default::default()
        }
    }

    /// Preset for I/O-bound tasks: oversubscribed ceiling.
    pub fn io_bound() -> Self {
        Self {
            max_workers: num_cpus::get() * 2,
            ..Default::default()
        }
    }

    fn normalized(mut self) -> Self {
        if let Some(interval) = self.sweep_interval {
            if interval.is_zero() {
                self.sweep_interval = None;
            }
        }
        if self.max_workers > 0 && self.max_workers < self.idle_target {
            self.max_workers = self.idle_target;
        }
        self
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("idle_target", &self.idle_target)
            .field("max_workers", &self.max_workers)
            .field("sweep_interval", &self.sweep_interval)
            .field("on_panic", &self.on_panic.is_some())
            .finish()
    }
}

pub type Pool = Arc<PoolInner>;

/// Mutable pool state. The lock is held only for state transitions, never
/// across a mailbox send or task execution.
struct PoolState {
    idle: VecDeque<mpsc::Sender<Mail>>,
    pending: VecDeque<TaskCell>,
    running: usize,
    idle_target: usize,
    closed: bool,
}

/// Bounded worker pool. Workers are reused through an idle set, grown under
/// an optional ceiling, and torn down by the reclaimer once load drops.
pub struct PoolInner {
    state: Mutex<PoolState>,
    config: PoolConfig,
    pub(crate) task_cache: ObjectCache<TaskCell>,
    pub(crate) worker_cache: ObjectCache<Mailbox>,
    reclaim_token: CancellationToken,
    submitted: AtomicUsize,
    completed: AtomicUsize,
    panicked: AtomicUsize,
}

enum Dispatch {
    Deliver(mpsc::Sender<Mail>, TaskCell),
    Grow(TaskCell),
    Queued,
}

impl PoolInner {
    pub fn new(idle_target: usize, max_workers: usize) -> Pool {
        Self::with_config(PoolConfig {
            idle_target,
            max_workers,
            ..Default::default()
        })
    }

    pub fn with_config(config: PoolConfig) -> Pool {
        let config = config.normalized();
        let sweep = config.sweep_interval;
        let pool = Arc::new(PoolInner {
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                pending: VecDeque::new(),
                running: 0,
                idle_target: config.idle_target,
                closed: false,
            }),
            config,
            task_cache: ObjectCache::new(),
            worker_cache: ObjectCache::new(),
            reclaim_token: CancellationToken::new(),
            submitted: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
        });

        if let Some(interval) = sweep {
            spawn_reclaimer(&pool, interval);
        }

        pool
    }

    /// The normalized configuration this pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Submits a future for execution on the pool.
    pub async fn submit<F>(self: &Arc<Self>, job: F) -> Result<(), SubmitError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.submit_boxed(Some(Box::pin(job))).await
    }

    /// Nullable entry point: `None` is rejected with [`SubmitError::NilTask`]
    /// and has no effect on pool state.
    pub async fn submit_boxed(self: &Arc<Self>, job: Option<Job>) -> Result<(), SubmitError> {
        let Some(job) = job else {
            return Err(SubmitError::NilTask);
        };

        let mut cell = self.task_cache.acquire();
        cell.job = Some(job);

        let dispatch = {
            let mut state = self.lock_state();
            if state.closed {
                drop(state);
                self.task_cache.release(cell);
                return Err(SubmitError::Closed);
            }
            if let Some(tx) = state.idle.pop_front() {
                state.running += 1;
                Dispatch::Deliver(tx, cell)
            } else if self.config.max_workers == 0 || state.running < self.config.max_workers {
                state.running += 1;
                Dispatch::Grow(cell)
            } else {
                // Saturated: queue behind the ceiling, FIFO.
                state.pending.push_back(cell);
                Dispatch::Queued
            }
        };
        self.submitted.fetch_add(1, Ordering::Relaxed);

        // Delivery happens with the lock released; a slow handoff must not
        // stall unrelated submissions.
        match dispatch {
            Dispatch::Deliver(tx, cell) => {
                let _ = tx.send(Mail::Run(cell)).await;
            }
            Dispatch::Grow(cell) => {
                let tx = worker::spawn(self);
                let _ = tx.send(Mail::Run(cell)).await;
            }
            Dispatch::Queued => {}
        }

        Ok(())
    }

    /// Stops accepting submissions and terminates all currently idle
    /// workers. In-flight and already-queued tasks still complete.
    /// Idempotent.
    pub async fn close(&self) {
        let idlers = {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            state.closed = true;
            state.idle_target = 0;
            std::mem::take(&mut state.idle)
        };
        self.reclaim_token.cancel();
        for tx in idlers {
            let _ = tx.send(Mail::Exit).await;
        }
        tracing::debug!("pool closed");
    }

    /// Point-in-time snapshot of gauges and lifetime totals.
    pub fn metrics(&self) -> PoolMetrics {
        let (running, idle, pending) = {
            let state = self.lock_state();
            (state.running, state.idle.len(), state.pending.len())
        };
        PoolMetrics {
            running,
            idle,
            pending,
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }

    /// Completion callback from a worker. Decides, under the lock, whether
    /// the worker runs the next pending task, parks as idle, or terminates.
    pub(crate) fn on_worker_done(
        &self,
        mailbox: &mpsc::Sender<Mail>,
        crashed: bool,
    ) -> DoneAction {
        let mut state = self.lock_state();

        if let Some(next) = state.pending.pop_front() {
            // `running` stays unchanged: the capacity slot moves to the next
            // task, on this worker or on its replacement after a panic.
            return if crashed {
                DoneAction::Replace(next)
            } else {
                DoneAction::RunNext(next)
            };
        }

        state.running -= 1;
        // With the periodic sweep enabled, completions park unconditionally
        // and the sweep bounds the idle set; otherwise trim lazily here.
        let park = !crashed
            && !state.closed
            && (self.config.sweep_interval.is_some() || state.idle.len() < state.idle_target);
        if park {
            state.idle.push_back(mailbox.clone());
            DoneAction::Park
        } else {
            DoneAction::Exit
        }
    }

    /// Hands a pending task to a fresh worker after its predecessor
    /// panicked, so queued work never waits on a lost capacity slot.
    pub(crate) async fn respawn_for(self: &Arc<Self>, cell: TaskCell) {
        let tx = worker::spawn(self);
        let _ = tx.send(Mail::Run(cell)).await;
    }

    pub(crate) fn note_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a task panic and invokes the configured handler with the
    /// recovered payload. The handler call is itself guarded: a misbehaving
    /// handler must not skip the worker's completion bookkeeping.
    pub(crate) fn note_panicked(&self, payload: Box<dyn Any + Send>) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            panic = panic_message(&*payload),
            "task panicked; terminating worker"
        );
        if let Some(handler) = &self.config.on_panic {
            let handler = handler.clone();
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
                handler(payload)
            }));
        }
    }

    /// Trims the idle set down to the target, discarding the most recently
    /// parked workers first.
    async fn discard_idle(&self) {
        let excess = {
            let mut state = self.lock_state();
            if state.idle.len() <= state.idle_target {
                return;
            }
            let keep = state.idle_target;
            state.idle.split_off(keep)
        };
        tracing::debug!(discarded = excess.len(), "idle sweep");
        for tx in excess {
            let _ = tx.send(Mail::Exit).await;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        // State transitions never unwind mid-update; recover the guard
        // instead of propagating a poison error.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.reclaim_token.cancel();
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        // Idle mailboxes are empty, so the non-blocking send cannot hit a
        // full buffer.
        for tx in state.idle.drain(..) {
            let _ = tx.try_send(Mail::Exit);
        }
    }
}

/// Background sweep bounding the retained idle set; exits when the pool is
/// closed or dropped.
fn spawn_reclaimer(pool: &Arc<PoolInner>, interval: Duration) {
    let weak = Arc::downgrade(pool);
    let token = pool.reclaim_token.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let Some(pool) = weak.upgrade() else { break };
                    pool.discard_idle().await;
                }
                _ = token.cancelled() => break,
            }
        }
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
