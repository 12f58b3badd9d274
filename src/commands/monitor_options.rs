//! Monitor options shared by the commands that run a monitoring session.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches};
use regex::Regex;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::threads_monitor::{
    Metric, MonitorConfig, NameFilter, Report, Sink, ThreadsMonitor, TimeSource,
};

/// Arguments accepted by every monitoring command
pub fn monitor_args() -> Vec<Arg> {
    vec![
        Arg::new("period")
            .short('p')
            .long("period")
            .value_name("MS")
            .help("Sampling period in milliseconds")
            .value_parser(clap::value_parser!(u64))
            .default_value("50"),
        Arg::new("levels")
            .short('l')
            .long("levels")
            .value_name("N")
            .help("Number of levels of the charts")
            .value_parser(clap::value_parser!(usize))
            .default_value("5"),
        Arg::new("user")
            .short('u')
            .long("user")
            .help("Chart user time instead of CPU time")
            .action(ArgAction::SetTrue),
        Arg::new("filter")
            .short('f')
            .long("filter")
            .value_name("REGEX")
            .help("Only report threads whose name matches"),
        Arg::new("output")
            .short('o')
            .long("output")
            .value_name("FILE")
            .help("Write the report to a file instead of stdout")
            .value_parser(clap::value_parser!(PathBuf)),
        Arg::new("json")
            .long("json")
            .help("Print a JSON summary on stdout; the text report then goes only to --output")
            .action(ArgAction::SetTrue),
    ]
}

/// Where the text report is written
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReportTarget {
    File(PathBuf),
    Stdout,
    /// stdout carries the JSON summary alone
    Discard,
}

/// Parsed monitoring options
#[derive(Debug)]
pub struct MonitorOptions {
    pub config: MonitorConfig,
    pub filter: Option<Regex>,
    pub output: Option<PathBuf>,
    pub json: bool,
}

impl MonitorOptions {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let period = matches.get_one::<u64>("period").copied().unwrap_or(50);
        let levels = matches.get_one::<usize>("levels").copied().unwrap_or(5);
        let metric = if matches.get_flag("user") {
            Metric::User
        } else {
            Metric::Cpu
        };

        let filter = matches
            .get_one::<String>("filter")
            .map(|pattern| {
                Regex::new(pattern).with_context(|| format!("Invalid filter pattern: {}", pattern))
            })
            .transpose()?;

        let config = MonitorConfig::new(Duration::from_millis(period), metric, levels);
        config.validate().context("Invalid monitor options")?;

        Ok(Self {
            config,
            filter,
            output: matches.get_one::<PathBuf>("output").cloned(),
            json: matches.get_flag("json"),
        })
    }

    fn report_target(&self) -> ReportTarget {
        match (&self.output, self.json) {
            (Some(path), _) => ReportTarget::File(path.clone()),
            (None, false) => ReportTarget::Stdout,
            (None, true) => ReportTarget::Discard,
        }
    }

    fn sink(&self) -> Result<Sink> {
        match self.report_target() {
            ReportTarget::File(path) => {
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create report file: {:?}", path))?;
                Ok(Box::new(BufWriter::new(file)))
            }
            ReportTarget::Stdout => Ok(Box::new(io::stdout())),
            ReportTarget::Discard => Ok(Box::new(io::sink())),
        }
    }

    fn name_filter(&self) -> NameFilter {
        match self.filter.clone() {
            Some(regex) => Box::new(move |name: &str| regex.is_match(name)),
            None => Box::new(|_: &str| true),
        }
    }

    /// Start a monitor over the given source with these options
    pub fn start<S: TimeSource>(&self, source: S) -> Result<ThreadsMonitor> {
        ThreadsMonitor::builder()
            .config(self.config.clone())
            .sink(self.sink()?)
            .filter(self.name_filter())
            .time_source(source)
            .start()
            .context("Failed to start the threads monitor")
    }

    /// Stop the monitor and print the JSON summary when requested
    pub fn finish(&self, monitor: ThreadsMonitor) -> Result<Report> {
        let report = monitor.stop().context("Failed to stop the threads monitor")?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&report.summary())?);
        }
        Ok(report)
    }
}
