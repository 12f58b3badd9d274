use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{Result, ThmonError};

const DEFAULT_PERIOD_MS: u64 = 50;
const DEFAULT_LEVELS: usize = 5;

/// Which accumulated time is charted and reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Total execution time (user + system)
    #[default]
    Cpu,
    /// Time spent executing in user space only
    User,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Cpu => "CPU",
            Metric::User => "User",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Settings of a monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between two samples
    #[serde(with = "millis")]
    pub period: Duration,
    #[serde(default)]
    pub metric: Metric,
    /// Vertical resolution of the per-worker charts
    pub levels: usize,
}

impl MonitorConfig {
    pub fn new(period: Duration, metric: Metric, levels: usize) -> Self {
        Self {
            period,
            metric,
            levels,
        }
    }

    /// Check the settings before any background activity is started.
    pub fn validate(&self) -> Result<()> {
        if self.period < Duration::from_millis(1) {
            return Err(ThmonError::config("period must be >= 1ms"));
        }
        if self.levels < 1 {
            return Err(ThmonError::config("levels must be >= 1"));
        }
        Ok(())
    }

    pub fn period_ms(&self) -> u128 {
        self.period.as_millis()
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(DEFAULT_PERIOD_MS),
            metric: Metric::default(),
            levels: DEFAULT_LEVELS,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(period: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(period.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
