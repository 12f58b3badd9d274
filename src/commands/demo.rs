//! Compute-intensive demo workload run under a threads monitor.

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use colored::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use super::monitor_options::{monitor_args, MonitorOptions};
use crate::platform::ProcThreads;

/// Largest accepted range end; keeps the Collatz sequences well inside `u64`
pub const MAX_RANGE_END: u64 = 1 << 40;

/// Computation split across the demo pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    /// Count the primes in the range
    Primes,
    /// Longest Collatz sequence in the range
    Collatz,
}

impl Workload {
    fn run(self, a: u64, b: u64) -> u64 {
        match self {
            Workload::Primes => count_primes(a, b),
            Workload::Collatz => collatz_max_steps(a, b),
        }
    }

    fn combine(self, acc: u64, part: u64) -> u64 {
        match self {
            Workload::Primes => acc + part,
            Workload::Collatz => acc.max(part),
        }
    }
}

pub fn command() -> Command {
    Command::new("demo")
        .about("Run a compute-intensive demo on a thread pool and chart its threads")
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .help("Number of pool threads")
                .value_parser(clap::value_parser!(usize))
                .default_value("4"),
        )
        .arg(
            Arg::new("tasks")
                .long("tasks")
                .value_name("N")
                .help("Number of tasks the range is split into")
                .value_parser(clap::value_parser!(usize))
                .default_value("16"),
        )
        .arg(
            Arg::new("kind")
                .short('k')
                .long("kind")
                .help("Computation to run")
                .value_parser(["primes", "collatz"])
                .default_value("primes"),
        )
        .arg(
            Arg::new("from")
                .long("from")
                .value_name("A")
                .help("Start of the range")
                .value_parser(clap::value_parser!(u64))
                .default_value("1"),
        )
        .arg(
            Arg::new("to")
                .long("to")
                .value_name("B")
                .help("End of the range (inclusive)")
                .value_parser(clap::value_parser!(u64))
                .default_value("3000000"),
        )
        .args(monitor_args())
}

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let options = MonitorOptions::from_matches(matches)?;

    let threads = matches.get_one::<usize>("threads").copied().unwrap_or(4);
    let tasks = matches.get_one::<usize>("tasks").copied().unwrap_or(16);
    let a = matches.get_one::<u64>("from").copied().unwrap_or(1);
    let b = matches.get_one::<u64>("to").copied().unwrap_or(3_000_000);
    let workload = match matches.get_one::<String>("kind").map(String::as_str) {
        Some("collatz") => Workload::Collatz,
        _ => Workload::Primes,
    };

    if threads == 0 || tasks == 0 {
        bail!("threads and tasks must be >= 1");
    }
    if a == 0 || a > b {
        bail!("invalid range [{}, {}]", a, b);
    }
    if b > MAX_RANGE_END {
        bail!("range end {} exceeds the demo limit {}", b, MAX_RANGE_END);
    }

    let monitor = options.start(ProcThreads::current())?;
    let result = parallel(threads, tasks, workload, a, b)?;
    options.finish(monitor)?;

    eprintln!(
        "{} {:?} over [{}, {}] = {}",
        "Result:".green().bold(),
        workload,
        a,
        b,
        result
    );
    Ok(())
}

/// Number of primes in `[a, b]`
pub fn count_primes(a: u64, b: u64) -> u64 {
    (a..=b).filter(|&n| is_prime(n)).count() as u64
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2;
    while d <= n / d {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

/// Largest number of Collatz steps needed to reach 1 from any number in `[a, b]`
pub fn collatz_max_steps(a: u64, b: u64) -> u64 {
    (a.max(1)..=b)
        .map(|mut n| {
            let mut steps = 0;
            while n != 1 {
                n = if n % 2 == 0 {
                    n / 2
                } else {
                    match n.checked_mul(3).and_then(|m| m.checked_add(1)) {
                        Some(next) => next,
                        None => break,
                    }
                };
                steps += 1;
            }
            steps
        })
        .max()
        .unwrap_or(0)
}

/// Split `[a, b]` into `tasks` parts run by a pool of `threads` named threads
pub fn parallel(threads: usize, tasks: usize, workload: Workload, a: u64, b: u64) -> Result<u64> {
    let size = b - a + 1;
    let parts = (tasks as u64).min(size).max(1);
    let part_size = size / parts;
    let ranges: Vec<(u64, u64)> = (0..parts)
        .map(|i| {
            let start = a + i * part_size;
            let end = if i + 1 < parts { start + part_size - 1 } else { b };
            (start, end)
        })
        .collect();

    let next = AtomicUsize::new(0);
    let result = Mutex::new(0u64);

    thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads {
            let handle = thread::Builder::new()
                .name(format!("demo-worker-{}", i + 1))
                .spawn_scoped(scope, || loop {
                    let Some(&(start, end)) = ranges.get(next.fetch_add(1, Ordering::Relaxed))
                    else {
                        break;
                    };
                    let part = workload.run(start, end);
                    let mut acc = result.lock();
                    *acc = workload.combine(*acc, part);
                })
                .context("Failed to spawn demo worker")?;
            handles.push(handle);
        }
        for handle in handles {
            if handle.join().is_err() {
                bail!("demo worker panicked");
            }
        }
        Ok(())
    })?;

    Ok(result.into_inner())
}
