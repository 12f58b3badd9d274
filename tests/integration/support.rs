// Shared helpers for the integration tests: a scripted time source and an
// in-memory report sink.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thmon::core::threads_monitor::{QueryError, TimeSource, WorkerId, WorkerTimes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// Executes all the time
    Busy,
    /// Never executes
    Idle,
}

struct ScriptedWorker {
    id: WorkerId,
    name: String,
    activity: Activity,
    born: Instant,
    alive: bool,
}

/// Time source whose workers are scripted by the test.
///
/// A busy worker accumulates CPU and user time at wall-clock speed, an idle
/// worker never accumulates any.
#[derive(Clone)]
pub struct ScriptedSource {
    workers: Arc<Mutex<Vec<ScriptedWorker>>>,
    parallelism: usize,
    supported: bool,
}

impl ScriptedSource {
    pub fn new(parallelism: usize) -> Self {
        Self {
            workers: Arc::new(Mutex::new(Vec::new())),
            parallelism,
            supported: true,
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(1)
        }
    }

    pub fn add(&self, id: WorkerId, name: &str, activity: Activity) {
        self.workers.lock().push(ScriptedWorker {
            id,
            name: name.to_string(),
            activity,
            born: Instant::now(),
            alive: true,
        });
    }

    pub fn kill(&self, id: WorkerId) {
        if let Some(worker) = self.workers.lock().iter_mut().find(|w| w.id == id) {
            worker.alive = false;
        }
    }

    fn with_live<T>(
        &self,
        id: WorkerId,
        f: impl FnOnce(&ScriptedWorker) -> T,
    ) -> Result<T, QueryError> {
        self.workers
            .lock()
            .iter()
            .find(|w| w.id == id && w.alive)
            .map(f)
            .ok_or(QueryError::Vanished(id))
    }
}

impl TimeSource for ScriptedSource {
    fn cpu_time_supported(&self) -> bool {
        self.supported
    }

    fn live_workers(&self) -> Result<Vec<WorkerId>, QueryError> {
        Ok(self
            .workers
            .lock()
            .iter()
            .filter(|w| w.alive)
            .map(|w| w.id)
            .collect())
    }

    fn worker_name(&self, id: WorkerId) -> Result<String, QueryError> {
        self.with_live(id, |w| w.name.clone())
    }

    fn worker_times(&self, id: WorkerId) -> Result<WorkerTimes, QueryError> {
        self.with_live(id, |w| {
            let executed = match w.activity {
                Activity::Busy => w.born.elapsed(),
                Activity::Idle => Duration::ZERO,
            };
            WorkerTimes::new(executed, executed)
        })
    }

    fn parallelism(&self) -> usize {
        self.parallelism
    }
}

/// Cloneable in-memory sink
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Wait until `condition` holds, failing the test after a generous timeout
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}
