// Integration tests for the reports produced by complete monitoring sessions

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thmon::core::threads_monitor::{Metric, MonitorConfig, Report, Sampler, ThreadsMonitor};

use super::support::{wait_until, Activity, ScriptedSource, SharedBuffer};

fn run_session(source: &ScriptedSource, levels: usize, duration: Duration) -> (Report, String) {
    let sink = SharedBuffer::default();
    let monitor = ThreadsMonitor::new(
        MonitorConfig::new(Duration::from_millis(100), Metric::Cpu, levels),
        source.clone(),
        sink.clone(),
        |_| true,
    )
    .unwrap();
    thread::sleep(duration);
    let report = monitor.stop().unwrap();
    (report, sink.contents())
}

#[test]
fn test_busy_worker_session() {
    let source = ScriptedSource::new(4);
    source.add(1, "busy", Activity::Busy);

    let (report, text) = run_session(&source, 3, Duration::from_millis(500));

    assert!(report.ticks >= 4, "only {} ticks", report.ticks);
    assert_eq!(report.workers.len(), 1);

    // every row is emitted, the top one included, and filled on every tick
    let chart: Vec<&str> = report.workers[0].chart.lines().collect();
    assert_eq!(chart.len(), 3, "unexpected chart {:?}", chart);
    assert!(chart[0].starts_with("     ┤"));
    assert!(chart[2].starts_with("busy ┤"));
    for row in &chart {
        let (_, body) = row.split_once('┤').unwrap();
        assert_eq!(body.chars().count(), report.ticks - 1);
        assert!(body.chars().all(|c| c == '┃'), "unexpected row {:?}", row);
    }

    let cpu = report.cpu_total.as_millis();
    assert!((250..=800).contains(&cpu), "cpu total {}ms", cpu);
    // one busy worker out of four units
    assert!(report.cpu_percent() > 10.0 && report.cpu_percent() < 30.0);
    assert!(text.starts_with("Period 100ms  CPU time charts  Levels 3\n"));
    assert!(text.ends_with(&format!("Real time: {}ms\n", report.summary().real_ms)));
}

#[test]
fn test_idle_worker_charts_only_zero_glyphs() {
    let source = ScriptedSource::new(2);
    source.add(7, "idle", Activity::Idle);

    let (report, _) = run_session(&source, 3, Duration::from_millis(350));

    let chart = &report.workers[0].chart;
    assert_eq!(chart.lines().count(), 1);
    let body: String = chart.trim_end().chars().skip("idle ┤".chars().count()).collect();
    assert!(!body.is_empty());
    assert!(body.chars().all(|c| c == '▁'), "unexpected chart {:?}", chart);
    assert_eq!(report.cpu_total, Duration::ZERO);
    assert_eq!(report.cpu_percent(), 0.0);
}

#[test]
fn test_filter_limits_charts_and_totals() {
    let source = ScriptedSource::new(2);
    source.add(1, "main", Activity::Busy);
    source.add(2, "worker-1", Activity::Idle);
    let sink = SharedBuffer::default();

    let monitor = ThreadsMonitor::builder()
        .period_ms(20)
        .levels(2)
        .sink(sink.clone())
        .filter(|name| name.starts_with("worker"))
        .time_source(source)
        .start()
        .unwrap();
    wait_until(|| monitor.ticks() >= 5);
    let report = monitor.stop().unwrap();

    assert_eq!(report.workers.len(), 1);
    assert_eq!(report.workers[0].name, "worker-1");
    assert_eq!(report.cpu_total, Duration::ZERO);
    assert!(!sink.contents().contains("main"));
}

fn tick(sampler: &mut Sampler<ScriptedSource>) {
    // keeps sample timestamps strictly increasing
    thread::sleep(Duration::from_millis(2));
    sampler.tick();
}

#[test]
fn test_late_and_terminated_worker_chart() {
    let source = ScriptedSource::new(1);
    let mut sampler = Sampler::new(source.clone(), Instant::now(), Arc::new(AtomicUsize::new(0)));
    for _ in 0..3 {
        tick(&mut sampler);
    }
    source.add(9, "late", Activity::Idle);
    tick(&mut sampler);
    tick(&mut sampler);
    source.kill(9);
    tick(&mut sampler);
    tick(&mut sampler);

    let outcome = sampler.into_outcome();
    let config = MonitorConfig::new(Duration::from_millis(50), Metric::Cpu, 2);
    let report = Report::build(
        &outcome.workers,
        |_| true,
        &config,
        Duration::from_millis(350),
        1,
        outcome.ticks,
    );

    assert_eq!(report.ticks, 7);
    assert!(report.workers[0].terminated);
    assert_eq!(report.workers[0].chart, "late ┤...▁××\n");
}
