use thiserror::Error;

/// Errors returned synchronously from a submission. Task failures are never
/// surfaced here: by the time a task runs, its `submit` call has already
/// returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The submission carried no task.
    #[error("task is nil")]
    NilTask,
    /// The pool has been closed and no longer accepts work.
    #[error("already closed pool")]
    Closed,
}
