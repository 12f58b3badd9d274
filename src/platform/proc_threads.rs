//! Thread execution times read from procfs.
//!
//! Threads are listed from `/proc/<pid>/task`. User time comes from the
//! `utime` field of each task's `stat` file. CPU time of threads in the calling
//! process comes from the kernel's per-thread CPU clock, which has nanosecond
//! resolution; for other processes it is `utime + stime` in clock ticks.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sysinfo::{CpuRefreshKind, System};
use thiserror::Error;

use crate::core::threads_monitor::{QueryError, TimeSource, WorkerId, WorkerTimes};
use crate::error::{Result, ThmonError};

/// Process whose threads are observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Current,
    Process(u32),
}

/// [`TimeSource`] over the threads of one process.
#[derive(Debug, Clone)]
pub struct ProcThreads {
    target: Target,
    clock_ticks: u64,
    parallelism: usize,
}

/// Scheduling times of a task, in clock ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStat {
    pub utime: u64,
    pub stime: u64,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StatParseError {
    #[error("missing command name")]
    MissingComm,
    #[error("missing field {0}")]
    MissingField(usize),
    #[error("invalid value in field {0}")]
    InvalidField(usize),
}

impl ProcThreads {
    /// Observe the threads of the calling process.
    pub fn current() -> Self {
        Self {
            target: Target::Current,
            clock_ticks: clock_ticks_per_second(),
            parallelism: host_parallelism(),
        }
    }

    /// Observe the threads of another process.
    pub fn attach(pid: u32) -> Result<Self> {
        let source = Self {
            target: Target::Process(pid),
            clock_ticks: clock_ticks_per_second(),
            parallelism: host_parallelism(),
        };
        if !source.task_dir().is_dir() {
            return Err(ThmonError::platform(format!(
                "no such process: {} ({} not found)",
                pid,
                source.task_dir().display()
            )));
        }
        Ok(source)
    }

    fn task_dir(&self) -> PathBuf {
        match self.target {
            Target::Current => PathBuf::from("/proc/self/task"),
            Target::Process(pid) => PathBuf::from(format!("/proc/{}/task", pid)),
        }
    }

    fn task_file(&self, id: WorkerId, file: &str) -> PathBuf {
        self.task_dir().join(id.to_string()).join(file)
    }

    fn read_stat(&self, id: WorkerId) -> std::result::Result<TaskStat, QueryError> {
        let contents =
            fs::read_to_string(self.task_file(id, "stat")).map_err(|e| classify(id, e))?;
        contents
            .parse()
            .map_err(|e: StatParseError| QueryError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    fn ticks_to_duration(&self, ticks: u64) -> Duration {
        let hz = self.clock_ticks.max(1);
        Duration::from_secs(ticks / hz) + Duration::from_nanos((ticks % hz) * 1_000_000_000 / hz)
    }
}

impl TimeSource for ProcThreads {
    fn cpu_time_supported(&self) -> bool {
        cfg!(target_os = "linux") && self.task_dir().is_dir()
    }

    fn live_workers(&self) -> std::result::Result<Vec<WorkerId>, QueryError> {
        let entries = match fs::read_dir(self.task_dir()) {
            Ok(entries) => entries,
            // the observed process has exited
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect())
    }

    fn worker_name(&self, id: WorkerId) -> std::result::Result<String, QueryError> {
        let comm = fs::read_to_string(self.task_file(id, "comm")).map_err(|e| classify(id, e))?;
        Ok(comm.trim_end_matches('\n').to_string())
    }

    fn worker_times(&self, id: WorkerId) -> std::result::Result<WorkerTimes, QueryError> {
        let stat = self.read_stat(id)?;
        let user = self.ticks_to_duration(stat.utime);

        let cpu = match self.target {
            Target::Current => thread_cpu_time(id).map_err(|e| classify_clock(id, e))?,
            Target::Process(_) => self.ticks_to_duration(stat.utime + stat.stime),
        };

        Ok(WorkerTimes::new(cpu, user))
    }

    fn parallelism(&self) -> usize {
        self.parallelism
    }
}

impl FromStr for TaskStat {
    type Err = StatParseError;

    /// Parse `/proc/<pid>/task/<tid>/stat`.
    ///
    /// The command name is parenthesized and may itself contain spaces and
    /// parentheses, so fields are counted from the last `)`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        const FIRST_AFTER_COMM: usize = 3;
        const UTIME: usize = 14;
        const STIME: usize = 15;

        let (_, rest) = s.rsplit_once(')').ok_or(StatParseError::MissingComm)?;
        let fields: Vec<&str> = rest.split_whitespace().collect();

        let field = |number: usize| -> std::result::Result<u64, StatParseError> {
            fields
                .get(number - FIRST_AFTER_COMM)
                .ok_or(StatParseError::MissingField(number))?
                .parse()
                .map_err(|_| StatParseError::InvalidField(number))
        };

        Ok(TaskStat {
            utime: field(UTIME)?,
            stime: field(STIME)?,
        })
    }
}

/// Map a failed procfs read to a vanished worker where appropriate
fn classify(id: WorkerId, error: io::Error) -> QueryError {
    if error.kind() == io::ErrorKind::NotFound || error.raw_os_error() == Some(libc::ESRCH) {
        QueryError::Vanished(id)
    } else {
        QueryError::Io(error)
    }
}

/// The per-thread clock is invalid once the thread has exited
fn classify_clock(id: WorkerId, error: io::Error) -> QueryError {
    if error.raw_os_error() == Some(libc::EINVAL) {
        QueryError::Vanished(id)
    } else {
        QueryError::Io(error)
    }
}

#[cfg(target_os = "linux")]
fn thread_cpu_time(tid: WorkerId) -> io::Result<Duration> {
    const CPUCLOCK_PERTHREAD: libc::clockid_t = 4;
    const CPUCLOCK_SCHED: libc::clockid_t = 2;

    let tid = libc::pid_t::try_from(tid)
        .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
    // Encoding of a thread CPU clock id, see clock_getcpuclockid(3)
    let clock: libc::clockid_t = ((!tid) << 3) | CPUCLOCK_PERTHREAD | CPUCLOCK_SCHED;

    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `clock_gettime` only writes to the valid `timespec` we pass; an
    // unknown clock id is reported through the return value.
    if unsafe { libc::clock_gettime(clock, &mut ts) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32))
}

#[cfg(not(target_os = "linux"))]
fn thread_cpu_time(_tid: WorkerId) -> io::Result<Duration> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(unix)]
fn clock_ticks_per_second() -> u64 {
    // SAFETY: `sysconf` is thread-safe for this query and has no side effects.
    let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if hz > 0 {
        hz as u64
    } else {
        100
    }
}

#[cfg(not(unix))]
fn clock_ticks_per_second() -> u64 {
    100
}

/// Number of CPUs the process may run on.
///
/// `available_parallelism` honours the affinity mask and cgroup quota; the
/// `sysinfo` count of online CPUs caps it and stands in when it is unknown.
pub fn host_parallelism() -> usize {
    let available = std::thread::available_parallelism().map(|n| n.get()).ok();

    let mut system = System::new();
    system.refresh_cpu_list(CpuRefreshKind::nothing());
    let online = system.cpus().len();

    match (available, online) {
        (Some(available), 0) => available,
        (Some(available), online) => available.min(online),
        (None, 0) => 1,
        (None, online) => online,
    }
}
