//! Per-thread execution time monitoring.
//!
//! A [`ThreadsMonitor`] samples the CPU and user time of every thread of a
//! process at a fixed period, from creation until [`ThreadsMonitor::stop`].
//! The report shows one quantized chart per thread and the totals of the
//! selected threads against the machine time available over the session.

pub mod chart;
mod config;
mod monitor;
mod recorder;
mod report;
mod scheduler;
mod time_source;

pub use config::{Metric, MonitorConfig};
pub use monitor::{MonitorBuilder, MonitorState, NameFilter, Sink, ThreadsMonitor};
pub use recorder::{Interval, Reading, Recorder, Sample};
pub use report::{machine_time, Report, ReportSummary, WorkerChart, WorkerSummary};
pub use scheduler::{Sampler, SamplerOutcome, WorkerMap};
pub use time_source::{QueryError, TimeSource, WorkerId, WorkerTimes};
