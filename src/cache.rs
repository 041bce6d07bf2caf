use crossbeam::queue::SegQueue;

/// Reset contract for recycled objects: after `recycle` the object must hold
/// no reference to a prior task or pool.
pub(crate) trait Recycle: Default {
    fn recycle(&mut self);
}

/// Thread-safe free-list of reusable objects, backed by a lock-free queue.
/// Bounds allocation churn under sustained short-task load.
pub(crate) struct ObjectCache<T> {
    slots: SegQueue<T>,
}

impl<T: Recycle> ObjectCache<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: SegQueue::new(),
        }
    }

    /// Returns a cached object, or a fresh default one when the list is
    /// empty. Acquired objects are always in their reset state.
    pub(crate) fn acquire(&self) -> T {
        self.slots.pop().unwrap_or_default()
    }

    /// Resets the object and places it back on the free-list.
    pub(crate) fn release(&self, mut obj: T) {
        obj.recycle();
        self.slots.push(obj);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
