//! Worker pool properties, checked with an instrumented fake invoker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use netsweep_core::{
    CancelToken, Dispatcher, InvokeError, Invoker, ParameterGenerator, RoutingProtocol,
    SimulationTask, Sweep, TaskStatus, Topology,
};

/// Records how many invocations are active at once and how often each task
/// was seen.
#[derive(Default)]
struct CountingInvoker {
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: Mutex<HashMap<(Topology, u32), usize>>,
    delay: Duration,
    fail_node_count: Option<u32>,
}

impl CountingInvoker {
    fn with_delay(delay: Duration) -> Self {
        CountingInvoker {
            delay,
            ..Default::default()
        }
    }

    fn calls(&self) -> HashMap<(Topology, u32), usize> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

impl Invoker for CountingInvoker {
    fn invoke(&self, task: &SimulationTask) -> Result<(), InvokeError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .expect("calls mutex poisoned")
            .entry((task.topology, task.node_count))
            .or_insert(0) += 1;

        thread::sleep(self.delay);

        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.fail_node_count == Some(task.node_count) {
            Err(InvokeError::NonZeroExit { code: 1 })
        } else {
            Ok(())
        }
    }
}

fn init_logging() {
    // only the first call in the test binary succeeds
    let _ = simplelog::TestLogger::init(simplelog::LevelFilter::Trace, simplelog::Config::default());
}

fn make_sweep(node_counts: &[u32], workers: usize) -> Sweep {
    Sweep {
        name: "theName".to_string(),
        workers,
        node_counts: node_counts.to_vec(),
        routing: RoutingProtocol::Aodv,
        topologies: vec![Topology::Grid, Topology::Disc],
    }
}

#[test]
fn example_scenario_runs_four_tasks_two_at_a_time() {
    init_logging();
    let sweep = make_sweep(&[10, 20], 2);
    let tasks = ParameterGenerator::new(&sweep).generate();
    assert_eq!(tasks.len(), 4);

    let dispatcher =
        Dispatcher::new(CountingInvoker::with_delay(Duration::from_millis(30)), 2).unwrap();
    let report = dispatcher.run(tasks);

    assert_eq!(report.total(), 4);
    assert_eq!(report.succeeded(), 4);
    assert!(report.peak_in_flight <= 2);
    assert!(dispatcher.invoker().max_active.load(Ordering::SeqCst) <= 2);

    let calls = dispatcher.invoker().calls();
    assert_eq!(calls.len(), 4);
    assert!(calls.values().all(|&n| n == 1));
}

#[test]
fn concurrency_never_exceeds_worker_count() {
    let node_counts: Vec<u32> = (1..=12).map(|n| n * 10).collect();
    for &workers in &[1, 3, 5, 30] {
        let sweep = make_sweep(&node_counts, workers);
        let dispatcher =
            Dispatcher::new(CountingInvoker::with_delay(Duration::from_millis(5)), workers)
                .unwrap();
        let report = dispatcher.run(ParameterGenerator::new(&sweep).generate());

        let max_active = dispatcher.invoker().max_active.load(Ordering::SeqCst);
        assert!(max_active >= 1);
        assert!(
            max_active <= workers,
            "{} invocations active with {} workers",
            max_active,
            workers
        );
        assert!(report.peak_in_flight <= workers);
        assert!(report.outcomes.iter().all(|o| o.worker.map_or(false, |w| w < workers)));
    }
}

#[test]
fn every_task_is_invoked_exactly_once() {
    let node_counts: Vec<u32> = (1..=25).collect();
    for &workers in &[1, 2, 7] {
        let sweep = make_sweep(&node_counts, workers);
        let tasks = ParameterGenerator::new(&sweep).generate();
        let dispatcher = Dispatcher::new(CountingInvoker::default(), workers).unwrap();
        let report = dispatcher.run(tasks.clone());

        let calls = dispatcher.invoker().calls();
        assert_eq!(calls.len(), tasks.len());
        for task in &tasks {
            assert_eq!(calls[&(task.topology, task.node_count)], 1);
        }
        let reported: Vec<&SimulationTask> = report.outcomes.iter().map(|o| &o.task).collect();
        assert_eq!(reported, tasks.iter().collect::<Vec<_>>());
    }
}

#[test]
fn run_returns_only_after_all_tasks_finished() {
    let sweep = make_sweep(&[10, 20, 40], 2);
    let dispatcher =
        Dispatcher::new(CountingInvoker::with_delay(Duration::from_millis(20)), 2).unwrap();
    let report = dispatcher.run(ParameterGenerator::new(&sweep).generate());

    assert_eq!(dispatcher.invoker().active.load(Ordering::SeqCst), 0);
    assert_eq!(report.total(), 6);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.status != TaskStatus::Skipped));
    // three rounds of two tasks each, at the very least
    assert!(report.elapsed >= Duration::from_millis(60));
}

#[test]
fn failing_task_does_not_stop_the_others() {
    init_logging();
    let sweep = make_sweep(&[10, 20, 40, 60], 3);
    let invoker = CountingInvoker {
        fail_node_count: Some(20),
        ..Default::default()
    };
    let dispatcher = Dispatcher::new(invoker, 3).unwrap();
    let report = dispatcher.run(ParameterGenerator::new(&sweep).generate());

    assert_eq!(report.total(), 8);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.succeeded(), 6);
    for outcome in &report.outcomes {
        if outcome.task.node_count == 20 {
            assert_eq!(
                outcome.status,
                TaskStatus::Failed(InvokeError::NonZeroExit { code: 1 })
            );
        } else {
            assert!(outcome.is_success());
        }
    }
    assert_eq!(dispatcher.invoker().calls().len(), 8);
}

#[test]
fn cancellation_skips_tasks_not_yet_started() {
    init_logging();
    let cancel = CancelToken::new();
    let started = AtomicUsize::new(0);
    let invoker = |_: &SimulationTask| -> Result<(), InvokeError> {
        if started.fetch_add(1, Ordering::SeqCst) == 1 {
            cancel.cancel();
        }
        thread::sleep(Duration::from_millis(10));
        Ok(())
    };
    let sweep = make_sweep(&[10, 20, 40, 60, 80], 1);
    let dispatcher = Dispatcher::new(invoker, 1)
        .unwrap()
        .with_cancel(cancel.clone());
    let report = dispatcher.run(ParameterGenerator::new(&sweep).generate());

    // the single worker finished two tasks, the second one cancelled the sweep
    assert_eq!(report.total(), 10);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.skipped(), 8);
    assert_eq!(started.load(Ordering::SeqCst), 2);
    assert!(report.outcomes[2..]
        .iter()
        .all(|o| o.status == TaskStatus::Skipped && o.worker.is_none()));
}
