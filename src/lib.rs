//! Bounded, reusable worker pool: controlled concurrency instead of a task
//! per submission.
//!
//! # Features
//! - Idle worker retention with lazy or periodic reclamation
//! - Optional concurrency ceiling with FIFO backpressure queueing
//! - Per-worker panic isolation with an optional handler callback
//! - Mailbox and task-descriptor recycling to bound allocation churn
//! - Process-wide default pool for drop-in use

pub mod errors;
pub mod model;
pub mod pool;
pub mod task;

mod cache;
mod worker;

use std::future::Future;
use std::sync::OnceLock;

pub use errors::SubmitError;
pub use model::PoolMetrics;
pub use pool::{PanicHandler, Pool, PoolConfig, PoolInner};
pub use task::Job;

static GLOBAL: OnceLock<Pool> = OnceLock::new();

/// Process-wide default pool, built with [`PoolConfig::default`] on first
/// use. Construction spawns the idle reclaimer, so the first call must
/// happen inside a Tokio runtime. Libraries and tests that need isolation
/// should construct their own [`Pool`] instead.
pub fn global() -> &'static Pool {
    GLOBAL.get_or_init(|| PoolInner::with_config(PoolConfig::default()))
}

/// Submits a task to the process-wide default pool.
pub async fn submit<F>(job: F) -> Result<(), SubmitError>
where
    F: Future<Output = ()> + Send + 'static,
{
    global().submit(job).await
}

/// Closes the process-wide default pool. Closing is permanent for the
/// process: [`global`] keeps returning the closed pool, and every later
/// [`submit`] fails with [`SubmitError::Closed`].
pub async fn close() {
    global().close().await
}
