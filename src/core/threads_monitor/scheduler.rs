//! Background sampling loop.
//!
//! The loop runs on its own OS thread driving a single-threaded Tokio runtime,
//! so it is never starved by the monitored workload or by other task pools.
//! It owns every recorder while it runs and hands them back when joined.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use super::recorder::Recorder;
use super::time_source::{QueryError, TimeSource, WorkerId};

const SAMPLER_THREAD_NAME: &str = "thmon-sampler";

/// Recorders keyed by worker id, kept in discovery order
#[derive(Debug, Default)]
pub struct WorkerMap {
    recorders: Vec<Recorder>,
    index: HashMap<WorkerId, usize>,
}

impl WorkerMap {
    pub fn contains(&self, id: WorkerId) -> bool {
        self.index.contains_key(&id)
    }

    /// Insert a recorder unless its worker is already known.
    pub fn insert(&mut self, recorder: Recorder) -> bool {
        if self.contains(recorder.id()) {
            return false;
        }
        self.index.insert(recorder.id(), self.recorders.len());
        self.recorders.push(recorder);
        true
    }

    pub fn get(&self, id: WorkerId) -> Option<&Recorder> {
        self.index.get(&id).map(|&i| &self.recorders[i])
    }

    pub fn len(&self) -> usize {
        self.recorders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recorder> {
        self.recorders.iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Recorder> {
        self.recorders.iter_mut()
    }

    pub fn into_recorders(self) -> Vec<Recorder> {
        self.recorders
    }
}

/// What the loop hands back once it has exited
#[derive(Debug)]
pub struct SamplerOutcome {
    pub workers: Vec<Recorder>,
    pub ticks: usize,
}

/// Discovers workers and samples their execution times, one tick at a time.
pub struct Sampler<S> {
    source: S,
    workers: WorkerMap,
    ticks: usize,
    started: Instant,
    tick_counter: Arc<AtomicUsize>,
}

impl<S: TimeSource> Sampler<S> {
    pub fn new(source: S, started: Instant, tick_counter: Arc<AtomicUsize>) -> Self {
        Self {
            source,
            workers: WorkerMap::default(),
            ticks: 0,
            started,
            tick_counter,
        }
    }

    pub fn workers(&self) -> &WorkerMap {
        &self.workers
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Run one tick: discover new workers, then sample every known worker.
    pub fn tick(&mut self) {
        self.discover();
        self.sample_all();
        self.ticks += 1;
        self.tick_counter.store(self.ticks, Ordering::Release);
    }

    fn discover(&mut self) {
        let ids = match self.source.live_workers() {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!("Failed to enumerate workers: {}", e);
                return;
            }
        };

        for id in ids {
            if self.workers.contains(id) {
                continue;
            }
            // A worker may end between enumeration and this query; it is then
            // picked up on a later tick or never.
            match self.source.worker_name(id) {
                Ok(name) => {
                    log::debug!("Discovered worker {} ({}) at tick {}", id, name, self.ticks);
                    self.workers.insert(Recorder::new(name, id, self.ticks));
                }
                Err(QueryError::Vanished(_)) => {}
                Err(e) => log::warn!("Failed to name worker {}: {}", id, e),
            }
        }
    }

    fn sample_all(&mut self) {
        let Self {
            source,
            workers,
            started,
            ..
        } = self;

        for recorder in workers.iter_mut() {
            if recorder.is_terminated() {
                recorder.sample(started.elapsed(), None);
                continue;
            }

            let at = started.elapsed();
            match source.worker_times(recorder.id()) {
                Ok(times) => recorder.sample(at, Some(times)),
                Err(QueryError::Vanished(_)) => {
                    log::debug!("Worker {} ({}) terminated", recorder.id(), recorder.name());
                    recorder.sample(at, None);
                }
                Err(e) => {
                    log::warn!(
                        "Failed to sample worker {} ({}), skipping this tick: {}",
                        recorder.id(),
                        recorder.name(),
                        e
                    );
                    recorder.miss(at);
                }
            }
        }
    }

    pub fn into_outcome(self) -> SamplerOutcome {
        SamplerOutcome {
            workers: self.workers.into_recorders(),
            ticks: self.ticks,
        }
    }
}

/// Start the sampling loop on a dedicated thread.
///
/// The runtime is built before the thread is spawned so that every failure is
/// reported to the caller synchronously.
pub fn spawn<S: TimeSource>(
    sampler: Sampler<S>,
    period: Duration,
    shutdown: broadcast::Receiver<()>,
) -> io::Result<JoinHandle<SamplerOutcome>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    thread::Builder::new()
        .name(SAMPLER_THREAD_NAME.to_string())
        .spawn(move || runtime.block_on(sampling_loop(sampler, period, shutdown)))
}

/// Tick until a shutdown message arrives or the sender is dropped.
async fn sampling_loop<S: TimeSource>(
    mut sampler: Sampler<S>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> SamplerOutcome {
    log::debug!("Sampling loop started, period {:?}", period);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        sampler.tick();

        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {}
        }
    }

    log::debug!(
        "Sampling loop stopped after {} ticks, {} workers",
        sampler.ticks(),
        sampler.workers().len()
    );
    sampler.into_outcome()
}
