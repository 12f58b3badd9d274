//! Monitoring session: construction starts sampling, `stop` reports.

use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use super::config::{Metric, MonitorConfig};
use super::report::Report;
use super::scheduler::{self, Sampler, SamplerOutcome};
use super::time_source::TimeSource;
use crate::error::{Result, ThmonError};
use crate::platform::ProcThreads;

/// Destination of the final report
pub type Sink = Box<dyn Write + Send>;

/// Selects the workers shown in the report by name
pub type NameFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Observable lifecycle of a [`ThreadsMonitor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Running,
    Stopped,
}

enum Lifecycle {
    Running {
        shutdown_tx: broadcast::Sender<()>,
        handle: JoinHandle<SamplerOutcome>,
    },
    Stopped,
}

struct Inner {
    lifecycle: Lifecycle,
    sink: Sink,
}

/// Monitors the execution times of the threads of a process.
///
/// Monitoring starts when the monitor is created: a dedicated thread samples
/// the CPU and user time of every live thread once per period. [`stop`]
/// ends the sampling and writes the charts and totals to the sink.
///
/// ```no_run
/// use thmon::core::threads_monitor::{Metric, ThreadsMonitor};
///
/// let monitor = ThreadsMonitor::builder()
///     .period_ms(50)
///     .metric(Metric::Cpu)
///     .levels(5)
///     .sink(std::io::stdout())
///     .filter(|_| true)
///     .start()?;
/// // ... code to monitor ...
/// monitor.stop()?;
/// # Ok::<(), thmon::ThmonError>(())
/// ```
///
/// Threads that start and finish between two samples may not be recorded.
///
/// [`stop`]: ThreadsMonitor::stop
pub struct ThreadsMonitor {
    config: MonitorConfig,
    filter: NameFilter,
    parallelism: usize,
    started: Instant,
    ticks: Arc<AtomicUsize>,
    inner: Mutex<Inner>,
}

impl ThreadsMonitor {
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::default()
    }

    /// Validate the settings and start sampling the workers of `source`.
    pub fn new<S, W, F>(config: MonitorConfig, source: S, sink: W, filter: F) -> Result<Self>
    where
        S: TimeSource,
        W: Write + Send + 'static,
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::start(config, source, Box::new(sink), Box::new(filter))
    }

    /// Monitor the threads of the calling process.
    pub fn for_current_process<W, F>(config: MonitorConfig, sink: W, filter: F) -> Result<Self>
    where
        W: Write + Send + 'static,
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::new(config, ProcThreads::current(), sink, filter)
    }

    fn start<S: TimeSource>(
        config: MonitorConfig,
        source: S,
        sink: Sink,
        filter: NameFilter,
    ) -> Result<Self> {
        config.validate()?;
        if !source.cpu_time_supported() {
            return Err(ThmonError::unsupported(
                "thread CPU time measurement is not available on this host",
            ));
        }

        let parallelism = source.parallelism().max(1);
        let ticks = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let sampler = Sampler::new(source, started, ticks.clone());
        let handle = scheduler::spawn(sampler, config.period, shutdown_rx)?;

        log::debug!(
            "Monitor started: period {}ms, {} time, {} levels, {} parallel units",
            config.period_ms(),
            config.metric,
            config.levels,
            parallelism
        );

        Ok(Self {
            config,
            filter,
            parallelism,
            started,
            ticks,
            inner: Mutex::new(Inner {
                lifecycle: Lifecycle::Running {
                    shutdown_tx,
                    handle,
                },
                sink,
            }),
        })
    }

    /// Stop monitoring and write the report to the sink.
    ///
    /// Blocks until the sampling thread has exited. Fails with
    /// [`ThmonError::AlreadyStopped`] if the monitor was already stopped.
    pub fn stop(&self) -> Result<Report> {
        let mut inner = self.inner.lock();

        let lifecycle = std::mem::replace(&mut inner.lifecycle, Lifecycle::Stopped);
        let (shutdown_tx, handle) = match lifecycle {
            Lifecycle::Running {
                shutdown_tx,
                handle,
            } => (shutdown_tx, handle),
            Lifecycle::Stopped => return Err(ThmonError::AlreadyStopped),
        };

        // send only fails once the loop has already exited
        let _ = shutdown_tx.send(());
        let outcome = handle.join().map_err(|_| ThmonError::SamplerPanicked)?;
        let real_time = self.started.elapsed();

        let report = Report::build(
            &outcome.workers,
            |name| (self.filter)(name),
            &self.config,
            real_time,
            self.parallelism,
            outcome.ticks,
        );

        log::info!(
            "Monitor stopped after {} ticks, {} workers sampled, {} reported",
            outcome.ticks,
            outcome.workers.len(),
            report.workers.len()
        );

        inner.sink.write_all(report.to_string().as_bytes())?;
        inner.sink.flush()?;

        Ok(report)
    }

    pub fn state(&self) -> MonitorState {
        match self.inner.lock().lifecycle {
            Lifecycle::Running { .. } => MonitorState::Running,
            Lifecycle::Stopped => MonitorState::Stopped,
        }
    }

    /// Number of sampling ticks completed so far
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Parallel execution units used to compute machine time
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }
}

impl Drop for ThreadsMonitor {
    fn drop(&mut self) {
        // The sampling thread is left to exit on its own, without a report.
        if let Lifecycle::Running { shutdown_tx, .. } = &self.inner.get_mut().lifecycle {
            let _ = shutdown_tx.send(());
        }
    }
}

impl fmt::Debug for ThreadsMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadsMonitor")
            .field("config", &self.config)
            .field("parallelism", &self.parallelism)
            .field("ticks", &self.ticks())
            .field("state", &self.state())
            .finish()
    }
}

/// Collects the settings of a [`ThreadsMonitor`].
///
/// Sink and filter have no default and must be set before [`start`].
///
/// [`start`]: MonitorBuilder::start
#[derive(Default)]
pub struct MonitorBuilder {
    config: MonitorConfig,
    source: Option<Box<dyn TimeSource>>,
    sink: Option<Sink>,
    filter: Option<NameFilter>,
}

impl MonitorBuilder {
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.config.period = period;
        self
    }

    pub fn period_ms(self, period: u64) -> Self {
        self.period(Duration::from_millis(period))
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.config.metric = metric;
        self
    }

    pub fn levels(mut self, levels: usize) -> Self {
        self.config.levels = levels;
        self
    }

    pub fn sink<W: Write + Send + 'static>(mut self, sink: W) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn filter<F: Fn(&str) -> bool + Send + Sync + 'static>(mut self, filter: F) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Source of worker times, the current process when not set
    pub fn time_source<S: TimeSource>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Validate everything and start monitoring.
    pub fn start(self) -> Result<ThreadsMonitor> {
        let Self {
            config,
            source,
            sink,
            filter,
        } = self;

        config.validate()?;
        let sink = sink.ok_or_else(|| ThmonError::config("sink must be set"))?;
        let filter = filter.ok_or_else(|| ThmonError::config("filter must be set"))?;
        let source = source.unwrap_or_else(|| Box::new(ProcThreads::current()));

        ThreadsMonitor::start(config, source, sink, filter)
    }
}
