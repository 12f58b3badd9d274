// Integration tests for the lifecycle of a ThreadsMonitor

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use thmon::core::threads_monitor::{Metric, MonitorConfig, MonitorState, ThreadsMonitor};
use thmon::ThmonError;

use super::support::{wait_until, Activity, ScriptedSource, SharedBuffer};

fn start(source: &ScriptedSource, sink: &SharedBuffer, period_ms: u64) -> ThreadsMonitor {
    ThreadsMonitor::builder()
        .period_ms(period_ms)
        .levels(3)
        .sink(sink.clone())
        .filter(|_| true)
        .time_source(source.clone())
        .start()
        .unwrap()
}

#[test]
fn test_monitor_runs_from_construction() {
    let source = ScriptedSource::new(2);
    source.add(1, "main", Activity::Idle);
    let sink = SharedBuffer::default();

    let monitor = start(&source, &sink, 10);
    assert_eq!(monitor.state(), MonitorState::Running);

    thread::sleep(Duration::from_millis(30));
    assert!(monitor.ticks() >= 1);

    monitor.stop().unwrap();
    assert_eq!(monitor.state(), MonitorState::Stopped);
}

#[test]
fn test_second_stop_fails_and_keeps_first_report() {
    let source = ScriptedSource::new(2);
    source.add(1, "main", Activity::Busy);
    let sink = SharedBuffer::default();

    let monitor = start(&source, &sink, 10);
    wait_until(|| monitor.ticks() >= 3);

    let report = monitor.stop().unwrap();
    let written = sink.contents();
    assert_eq!(written, report.to_string());

    assert!(matches!(monitor.stop(), Err(ThmonError::AlreadyStopped)));
    assert_eq!(sink.contents(), written);
}

#[test]
fn test_concurrent_stop_succeeds_once() {
    let source = ScriptedSource::new(1);
    source.add(1, "main", Activity::Idle);
    let sink = SharedBuffer::default();
    let monitor = Arc::new(start(&source, &sink, 5));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let monitor = monitor.clone();
            thread::spawn(move || monitor.stop().is_ok())
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(sink.contents().matches("Real time:").count(), 1);
}

#[test]
fn test_stop_interrupts_long_period() {
    let source = ScriptedSource::new(1);
    let sink = SharedBuffer::default();
    let monitor = start(&source, &sink, 60_000);
    wait_until(|| monitor.ticks() >= 1);

    let begin = Instant::now();
    let report = monitor.stop().unwrap();
    assert!(begin.elapsed() < Duration::from_secs(5));
    assert_eq!(report.ticks, 1);
}

#[test]
fn test_invalid_settings_fail_construction() {
    let source = ScriptedSource::new(1);

    let result = ThreadsMonitor::new(
        MonitorConfig::new(Duration::ZERO, Metric::Cpu, 3),
        source.clone(),
        SharedBuffer::default(),
        |_| true,
    );
    assert!(matches!(result, Err(ThmonError::Config(_))));

    let result = ThreadsMonitor::new(
        MonitorConfig::new(Duration::from_millis(10), Metric::Cpu, 0),
        source,
        SharedBuffer::default(),
        |_| true,
    );
    assert!(matches!(result, Err(ThmonError::Config(_))));
}

#[test]
fn test_unsupported_source_fails_construction() {
    let sink = SharedBuffer::default();
    let result = ThreadsMonitor::builder()
        .sink(sink.clone())
        .filter(|_| true)
        .time_source(ScriptedSource::unsupported())
        .start();

    assert!(matches!(result, Err(ThmonError::Unsupported(_))));
    assert!(sink.contents().is_empty());
}

#[test]
fn test_report_written_to_file_sink() {
    let source = ScriptedSource::new(2);
    source.add(1, "main", Activity::Busy);
    let file = NamedTempFile::new().unwrap();

    let monitor = ThreadsMonitor::new(
        MonitorConfig::new(Duration::from_millis(10), Metric::User, 2),
        source,
        file.reopen().unwrap(),
        |_| true,
    )
    .unwrap();
    wait_until(|| monitor.ticks() >= 3);
    let report = monitor.stop().unwrap();

    let written = std::fs::read_to_string(file.path()).unwrap();
    assert_eq!(written, report.to_string());
    assert!(written.starts_with("Period 10ms  User time charts  Levels 2\n"));
}

#[test]
fn test_drop_without_stop_writes_nothing() {
    let source = ScriptedSource::new(1);
    source.add(1, "main", Activity::Idle);
    let sink = SharedBuffer::default();

    let monitor = start(&source, &sink, 5);
    wait_until(|| monitor.ticks() >= 1);
    drop(monitor);

    thread::sleep(Duration::from_millis(20));
    assert!(sink.contents().is_empty());
}
