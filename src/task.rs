use std::future::Future;
use std::pin::Pin;

use crate::cache::Recycle;

/// A unit of work: a boxed future driven to completion by a single worker.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Recyclable task descriptor. A cell is owned by exactly one worker between
/// dispatch and execution; the worker takes the job out and releases the cell
/// back to the free-list before the job runs, so the slot is reusable while
/// the task is still in flight.
#[derive(Default)]
pub(crate) struct TaskCell {
    pub(crate) job: Option<Job>,
}

impl Recycle for TaskCell {
    fn recycle(&mut self) {
        self.job = None;
    }
}
