//! Monitor the threads of another running process.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use colored::*;
use std::sync::mpsc;
use std::time::Duration;

use super::monitor_options::{monitor_args, MonitorOptions};
use crate::platform::ProcThreads;

pub fn command() -> Command {
    Command::new("attach")
        .about("Chart the threads of a running process until Ctrl-C or a timeout")
        .arg(
            Arg::new("pid")
                .long("pid")
                .value_name("PID")
                .help("Process to monitor")
                .value_parser(clap::value_parser!(u32))
                .required(true),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration")
                .value_name("MS")
                .help("Stop after this many milliseconds (default: wait for Ctrl-C)")
                .value_parser(clap::value_parser!(u64)),
        )
        .args(monitor_args())
}

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let options = MonitorOptions::from_matches(matches)?;
    let pid = *matches.get_one::<u32>("pid").context("PID argument is required")?;
    let duration = matches.get_one::<u64>("duration").copied().map(Duration::from_millis);

    let source = ProcThreads::attach(pid)?;

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    let monitor = options.start(source)?;
    eprintln!(
        "{} process {} every {}ms ({})",
        "Monitoring".cyan().bold(),
        pid,
        options.config.period_ms(),
        match duration {
            Some(d) => format!("for {}ms", d.as_millis()),
            None => "press Ctrl-C to stop".to_string(),
        }
    );

    match duration {
        Some(duration) => {
            let _ = stop_rx.recv_timeout(duration);
        }
        None => {
            let _ = stop_rx.recv();
        }
    }

    options.finish(monitor)?;
    Ok(())
}
