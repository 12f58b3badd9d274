//! Per-worker time series of execution-time samples.

use std::time::Duration;

use super::config::Metric;
use super::time_source::{WorkerId, WorkerTimes};

/// What a single tick observed about a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    /// Accumulated times of a live worker
    Times(WorkerTimes),
    /// The query failed for this tick only; the worker may still be alive
    Missed,
    /// Termination sentinel: the worker no longer exists
    Gone,
}

/// One sampling of a worker, taken at a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Offset from the start of the session
    pub at: Duration,
    pub reading: Reading,
}

impl Sample {
    /// Accumulated times, if this sample has any
    pub fn times(&self) -> Option<WorkerTimes> {
        match self.reading {
            Reading::Times(times) => Some(times),
            Reading::Missed | Reading::Gone => None,
        }
    }
}

/// Utilization over the span between two consecutive samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interval {
    /// Fraction of the wall-clock span the worker spent executing
    Ratio(f64),
    /// No valid sample bounds the span on both sides
    Missed,
    /// The worker was gone at the end of the span
    Terminated,
}

/// Records the samples of one worker.
#[derive(Debug, Clone)]
pub struct Recorder {
    name: String,
    id: WorkerId,
    delay: usize,
    samples: Vec<Sample>,
    last_valid: Option<WorkerTimes>,
    terminated: bool,
}

impl Recorder {
    /// Create a recorder for a worker first observed after `delay` ticks.
    pub fn new(name: impl Into<String>, id: WorkerId, delay: usize) -> Self {
        Self {
            name: name.into(),
            id,
            delay,
            samples: Vec::new(),
            last_valid: None,
            terminated: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Number of ticks elapsed before the worker was first observed
    pub fn delay(&self) -> usize {
        self.delay
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Last times observed while the worker was alive
    pub fn last_valid(&self) -> Option<WorkerTimes> {
        self.last_valid
    }

    /// Append a sample taken at `at`. `None` records the termination sentinel.
    ///
    /// A terminated worker stays terminated: later samples are always recorded
    /// as the sentinel.
    pub fn sample(&mut self, at: Duration, times: Option<WorkerTimes>) {
        let reading = match times {
            Some(times) if !self.terminated => {
                self.last_valid = Some(times);
                Reading::Times(times)
            }
            _ => {
                self.terminated = true;
                Reading::Gone
            }
        };
        self.push(at, reading);
    }

    /// Record that the worker could not be queried at `at`.
    ///
    /// Unlike the termination sentinel this does not end the worker: the next
    /// valid sample covers the missed span.
    pub fn miss(&mut self, at: Duration) {
        let reading = if self.terminated {
            Reading::Gone
        } else {
            Reading::Missed
        };
        self.push(at, reading);
    }

    fn push(&mut self, at: Duration, reading: Reading) {
        debug_assert!(
            self.samples.last().map_or(true, |last| last.at < at),
            "samples must be strictly ordered in time"
        );
        self.samples.push(Sample { at, reading });
    }

    /// Utilization of every span between consecutive samples.
    ///
    /// The first sample has no preceding span, so the result holds one entry
    /// less than there are samples. Spans ending in a missed sample take the
    /// ratio measured between the valid samples around them.
    pub fn intervals(&self, metric: Metric) -> Vec<Interval> {
        let mut intervals = Vec::with_capacity(self.samples.len().saturating_sub(1));
        let mut previous: Option<(Duration, Duration)> = None;
        let mut pending = Vec::new();

        for (i, sample) in self.samples.iter().enumerate() {
            let interval = match sample.reading {
                Reading::Times(times) => {
                    let current = (sample.at, times.get(metric));
                    let interval = match previous {
                        Some((t0, c0)) => Interval::Ratio(ratio(t0, c0, current.0, current.1)),
                        None => Interval::Missed,
                    };
                    for index in pending.drain(..) {
                        intervals[index] = interval;
                    }
                    previous = Some(current);
                    interval
                }
                Reading::Missed => {
                    if i > 0 {
                        pending.push(intervals.len());
                    }
                    Interval::Missed
                }
                Reading::Gone => {
                    pending.clear();
                    Interval::Terminated
                }
            };

            if i > 0 {
                intervals.push(interval);
            }
        }

        intervals
    }

    /// Execution time accumulated between the first and the last valid sample
    pub fn total(&self, metric: Metric) -> Duration {
        let mut valid = self
            .samples
            .iter()
            .filter_map(|sample| sample.times().map(|times| times.get(metric)));

        match valid.next() {
            Some(first) => valid.last().unwrap_or(first).saturating_sub(first),
            None => Duration::ZERO,
        }
    }
}

fn ratio(t0: Duration, c0: Duration, t1: Duration, c1: Duration) -> f64 {
    let span = t1.saturating_sub(t0).as_secs_f64();
    if span <= 0.0 {
        return 0.0;
    }
    c1.saturating_sub(c0).as_secs_f64() / span
}
