//! Aggregate statistics and final textual report of a monitoring session.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::chart::{label_width, render_chart};
use super::config::{Metric, MonitorConfig};
use super::recorder::Recorder;

/// Chart and totals of one reported worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerChart {
    pub name: String,
    pub id: u64,
    pub chart: String,
    pub cpu_total: Duration,
    pub user_total: Duration,
    pub terminated: bool,
}

/// Result of a monitoring session, computed once when it stops.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub config: MonitorConfig,
    pub workers: Vec<WorkerChart>,
    pub cpu_total: Duration,
    pub user_total: Duration,
    pub machine_time: Duration,
    pub real_time: Duration,
    pub parallelism: usize,
    /// Number of sampling ticks performed
    pub ticks: usize,
}

/// Machine readable form of a [`Report`], without the charts
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub period_ms: u128,
    pub metric: Metric,
    pub levels: usize,
    pub ticks: usize,
    pub parallelism: usize,
    pub workers: Vec<WorkerSummary>,
    pub cpu_ms: u128,
    pub user_ms: u128,
    pub machine_ms: u128,
    pub real_ms: u128,
    pub cpu_percent: f64,
    pub user_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerSummary {
    pub name: String,
    pub id: u64,
    pub cpu_ms: u128,
    pub user_ms: u128,
    pub terminated: bool,
}

impl Report {
    /// Build the report over the recorders whose worker name passes `filter`.
    ///
    /// Recorders are reported in the order given, which is discovery order.
    pub fn build<F>(
        recorders: &[Recorder],
        filter: F,
        config: &MonitorConfig,
        real_time: Duration,
        parallelism: usize,
        ticks: usize,
    ) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let selected: Vec<&Recorder> = recorders.iter().filter(|r| filter(r.name())).collect();
        let width = label_width(selected.iter().map(|r| r.name()));

        let workers: Vec<WorkerChart> = selected
            .iter()
            .map(|recorder| WorkerChart {
                name: recorder.name().to_string(),
                id: recorder.id(),
                chart: render_chart(
                    recorder.name(),
                    width,
                    &recorder.intervals(config.metric),
                    config.levels,
                    recorder.delay(),
                ),
                cpu_total: recorder.total(Metric::Cpu),
                user_total: recorder.total(Metric::User),
                terminated: recorder.is_terminated(),
            })
            .collect();

        let cpu_total = workers.iter().map(|w| w.cpu_total).sum();
        let user_total = workers.iter().map(|w| w.user_total).sum();

        Self {
            config: config.clone(),
            workers,
            cpu_total,
            user_total,
            machine_time: machine_time(real_time, parallelism),
            real_time,
            parallelism,
            ticks,
        }
    }

    pub fn cpu_percent(&self) -> f64 {
        percent(self.cpu_total, self.machine_time)
    }

    pub fn user_percent(&self) -> f64 {
        percent(self.user_total, self.machine_time)
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            period_ms: self.config.period_ms(),
            metric: self.config.metric,
            levels: self.config.levels,
            ticks: self.ticks,
            parallelism: self.parallelism,
            workers: self
                .workers
                .iter()
                .map(|w| WorkerSummary {
                    name: w.name.clone(),
                    id: w.id,
                    cpu_ms: w.cpu_total.as_millis(),
                    user_ms: w.user_total.as_millis(),
                    terminated: w.terminated,
                })
                .collect(),
            cpu_ms: self.cpu_total.as_millis(),
            user_ms: self.user_total.as_millis(),
            machine_ms: round_ms(self.machine_time),
            real_ms: round_ms(self.real_time),
            cpu_percent: self.cpu_percent(),
            user_percent: self.user_percent(),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Period {}ms  {} time charts  Levels {}",
            self.config.period_ms(),
            self.config.metric,
            self.config.levels
        )?;
        for worker in &self.workers {
            writeln!(f, "{}", worker.chart)?;
        }
        writeln!(
            f,
            "CPU time:     Total {}ms  Percentage {:5.1}%",
            self.cpu_total.as_millis(),
            self.cpu_percent()
        )?;
        writeln!(
            f,
            "User time:    Total {}ms  Percentage {:5.1}%",
            self.user_total.as_millis(),
            self.user_percent()
        )?;
        writeln!(
            f,
            "Machine time: Total {}ms  Percentage {:5.1}%",
            round_ms(self.machine_time),
            100.0
        )?;
        writeln!(f, "Real time: {}ms", round_ms(self.real_time))
    }
}

/// Execution time available on the host during `real_time`
pub fn machine_time(real_time: Duration, parallelism: usize) -> Duration {
    real_time.saturating_mul(u32::try_from(parallelism).unwrap_or(u32::MAX))
}

fn percent(part: Duration, whole: Duration) -> f64 {
    if whole.is_zero() {
        return 0.0;
    }
    100.0 * part.as_secs_f64() / whole.as_secs_f64()
}

fn round_ms(duration: Duration) -> u128 {
    (duration.as_secs_f64() * 1000.0).round() as u128
}
