/// Point-in-time snapshot of pool gauges and lifetime totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Workers currently executing or assigned a task.
    pub running: usize,
    /// Workers parked for reuse.
    pub idle: usize,
    /// Tasks queued behind the worker ceiling.
    pub pending: usize,
    /// Accepted submissions since the pool was created.
    pub submitted: usize,
    /// Tasks that ran to completion.
    pub completed: usize,
    /// Tasks that panicked.
    pub panicked: usize,
}

impl PoolMetrics {
    /// Share of live workers that are busy.
    pub fn utilization(&self) -> f64 {
        if self.running + self.idle == 0 {
            return 0.0;
        }
        self.running as f64 / (self.running + self.idle) as f64
    }

    /// Share of finished tasks that completed without panicking.
    pub fn success_rate(&self) -> f64 {
        let finished = self.completed + self.panicked;
        if finished == 0 {
            return 1.0;
        }
        self.completed as f64 / finished as f64
    }
}
