//! Host facility the sampler polls for worker execution times.

use std::io;
use std::time::Duration;
use thiserror::Error;

use super::config::Metric;

/// Identifier of a worker (a kernel thread id on Linux)
pub type WorkerId = u64;

/// Accumulated execution times of one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerTimes {
    pub cpu: Duration,
    pub user: Duration,
}

impl WorkerTimes {
    pub fn new(cpu: Duration, user: Duration) -> Self {
        Self { cpu, user }
    }

    /// Select the time matching the given metric
    pub fn get(&self, metric: Metric) -> Duration {
        match metric {
            Metric::Cpu => self.cpu,
            Metric::User => self.user,
        }
    }
}

/// Failure of a query about a single worker
#[derive(Error, Debug)]
pub enum QueryError {
    /// The worker no longer exists. Not an error for the monitor.
    #[error("worker {0} no longer exists")]
    Vanished(WorkerId),

    #[error("failed to query worker: {0}")]
    Io(#[from] io::Error),
}

/// Source of per-worker execution times.
///
/// Implementations must return times in consistent units and report
/// [`QueryError::Vanished`] once a worker is gone.
pub trait TimeSource: Send + 'static {
    /// Whether per-worker CPU time can be measured on this host
    fn cpu_time_supported(&self) -> bool;

    /// Identifiers of all currently live workers
    fn live_workers(&self) -> Result<Vec<WorkerId>, QueryError>;

    /// Human readable name of a worker
    fn worker_name(&self, id: WorkerId) -> Result<String, QueryError>;

    /// Accumulated CPU and user time of a worker
    fn worker_times(&self, id: WorkerId) -> Result<WorkerTimes, QueryError>;

    /// Number of parallel execution units available on the host
    fn parallelism(&self) -> usize;
}

impl<T: TimeSource + ?Sized> TimeSource for Box<T> {
    fn cpu_time_supported(&self) -> bool {
        (**self).cpu_time_supported()
    }

    fn live_workers(&self) -> Result<Vec<WorkerId>, QueryError> {
        (**self).live_workers()
    }

    fn worker_name(&self, id: WorkerId) -> Result<String, QueryError> {
        (**self).worker_name(id)
    }

    fn worker_times(&self, id: WorkerId) -> Result<WorkerTimes, QueryError> {
        (**self).worker_times(id)
    }

    fn parallelism(&self) -> usize {
        (**self).parallelism()
    }
}
