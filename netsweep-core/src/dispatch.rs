//! Bounded worker pool executing sweep tasks.
//!
//! The [`Dispatcher`] owns a fixed number of worker threads. Workers pull
//! tasks from a shared queue in submission order, hand each one to the
//! [`Invoker`] and record the outcome. The queue, the in-flight counter and
//! the outcome slots live behind a single mutex, workers never talk to each
//! other directly.
//!
//! # Guarantees
//!
//! - no more than `workers` invocations are ever in flight,
//! - every task is invoked exactly once, unless the sweep is cancelled, in
//!   which case tasks that haven't started are recorded as skipped,
//! - [`Dispatcher::run`] returns only after every task reached a terminal
//!   state,
//! - a failing (or panicking) task doesn't affect the others.
//!
//! [`Dispatcher`]: struct.Dispatcher.html
//! [`Dispatcher::run`]: struct.Dispatcher.html#method.run
//! [`Invoker`]: ../invoker/trait.Invoker.html

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::invoker::{InvokeError, Invoker};
use crate::report::{SweepReport, TaskOutcome, TaskStatus};
use crate::task::SimulationTask;

/// Runs tasks on a fixed number of workers.
pub struct Dispatcher<I> {
    invoker: I,
    workers: usize,
    cancel: CancelToken,
}

impl<I: Invoker> Dispatcher<I> {
    /// Creates a new dispatcher. Fails if `workers` is zero.
    pub fn new(invoker: I, workers: usize) -> Result<Self> {
        if workers < 1 {
            return Err(Error::InvalidConfig(format!(
                "worker count must be at least 1, got {}",
                workers
            )));
        }
        Ok(Dispatcher {
            invoker,
            workers,
            cancel: CancelToken::new(),
        })
    }

    /// Uses the given token to stop handing out tasks once it's cancelled.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Executes all tasks and blocks until each one has an outcome.
    ///
    /// Outcomes in the returned report follow the order of `tasks`,
    /// regardless of the order in which they completed.
    pub fn run(&self, tasks: Vec<SimulationTask>) -> SweepReport {
        let started_at = Local::now();
        let started = Instant::now();
        let total = tasks.len();
        let pool = WorkPool::new(tasks);

        thread::scope(|scope| {
            for worker in 0..self.workers {
                let pool = &pool;
                let spawned = thread::Builder::new()
                    .name(format!("worker-{}", worker))
                    .spawn_scoped(scope, move || self.work(worker, pool, total));
                if let Err(e) = spawned {
                    error!("failed spawning worker thread {}: {}", worker, e);
                }
            }
        });

        // Workers that couldn't be spawned leave their share in the queue.
        // The calling thread is the only one left touching the pool now.
        if pool.has_pending() {
            warn!("no workers left, finishing remaining tasks on the calling thread");
            self.work(0, &pool, total);
        }

        let (outcomes, peak_in_flight) = pool.into_outcomes();
        debug_assert_eq!(outcomes.len(), total);
        SweepReport {
            started_at,
            elapsed: started.elapsed(),
            workers: self.workers,
            peak_in_flight,
            outcomes,
        }
    }

    fn work(&self, worker: usize, pool: &WorkPool, total: usize) {
        while let Some((slot, task)) = pool.next(&self.cancel) {
            info!("[{}/{}] starting {}", slot + 1, total, task.label());
            let started = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| self.invoker.invoke(&task)))
                .unwrap_or_else(|payload| {
                    Err(InvokeError::Panicked {
                        message: panic_message(payload.as_ref()),
                    })
                });
            let elapsed = started.elapsed();
            let status = match result {
                Ok(()) => {
                    info!("{} finished in {:.2?}", task.label(), elapsed);
                    TaskStatus::Succeeded
                }
                Err(e) => {
                    warn!("{} failed: {}", task.label(), e);
                    TaskStatus::Failed(e)
                }
            };
            pool.finish(
                slot,
                TaskOutcome {
                    task,
                    status,
                    elapsed,
                    worker: Some(worker),
                },
            );
        }
        trace!("worker {} done", worker);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Shared state of a single run.
struct WorkPool {
    state: Mutex<PoolState>,
}

struct PoolState {
    /// Tasks not yet started, tagged with their submission position
    pending: VecDeque<(usize, SimulationTask)>,
    in_flight: usize,
    peak_in_flight: usize,
    outcomes: Vec<Option<TaskOutcome>>,
}

impl WorkPool {
    fn new(tasks: Vec<SimulationTask>) -> Self {
        let outcomes = tasks.iter().map(|_| None).collect();
        WorkPool {
            state: Mutex::new(PoolState {
                pending: tasks.into_iter().enumerate().collect(),
                in_flight: 0,
                peak_in_flight: 0,
                outcomes,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // the state is never left half-updated, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Takes the next pending task, counting it as in flight.
    ///
    /// Once the token is cancelled all pending tasks are marked as skipped
    /// and `None` is returned.
    fn next(&self, cancel: &CancelToken) -> Option<(usize, SimulationTask)> {
        let mut state = self.lock();
        if cancel.is_cancelled() {
            if !state.pending.is_empty() {
                warn!("sweep cancelled, skipping {} pending tasks", state.pending.len());
            }
            while let Some((slot, task)) = state.pending.pop_front() {
                state.outcomes[slot] = Some(TaskOutcome {
                    task,
                    status: TaskStatus::Skipped,
                    elapsed: Duration::from_secs(0),
                    worker: None,
                });
            }
            return None;
        }
        let next = state.pending.pop_front()?;
        state.in_flight += 1;
        state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
        Some(next)
    }

    fn finish(&self, slot: usize, outcome: TaskOutcome) {
        let mut state = self.lock();
        state.in_flight -= 1;
        state.outcomes[slot] = Some(outcome);
    }

    fn has_pending(&self) -> bool {
        !self.lock().pending.is_empty()
    }

    fn into_outcomes(self) -> (Vec<TaskOutcome>, usize) {
        let state = self.state.into_inner().unwrap_or_else(|e| e.into_inner());
        let outcomes = state.outcomes.into_iter().flatten().collect();
        (outcomes, state.peak_in_flight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{RoutingProtocol, Topology};

    type InvokeResult = std::result::Result<(), InvokeError>;

    fn succeed(_: &SimulationTask) -> InvokeResult {
        Ok(())
    }

    fn tasks(n: u32) -> Vec<SimulationTask> {
        (0..n)
            .map(|i| SimulationTask::new(i, "test", RoutingProtocol::Aodv, Topology::Grid, 10 + i))
            .collect()
    }

    #[test]
    fn zero_workers_are_rejected() {
        assert!(matches!(
            Dispatcher::new(succeed, 0),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn outcomes_follow_submission_order() {
        let invoker = |task: &SimulationTask| -> InvokeResult {
            // later tasks finish first
            thread::sleep(Duration::from_millis(u64::from(20 - task.index * 5)));
            Ok(())
        };
        let dispatcher = Dispatcher::new(invoker, 4).unwrap();
        let report = dispatcher.run(tasks(4));
        let indices: Vec<u32> = report.outcomes.iter().map(|o| o.task.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(report.is_success());
    }

    #[test]
    fn empty_task_list_finishes_immediately() {
        let dispatcher = Dispatcher::new(succeed, 3).unwrap();
        let report = dispatcher.run(Vec::new());
        assert_eq!(report.total(), 0);
        assert_eq!(report.peak_in_flight, 0);
        assert!(report.is_success());
    }

    #[test]
    fn single_worker_runs_sequentially() {
        let dispatcher = Dispatcher::new(succeed, 1).unwrap();
        let report = dispatcher.run(tasks(5));
        assert_eq!(report.peak_in_flight, 1);
        assert!(report.outcomes.iter().all(|o| o.worker == Some(0)));
    }

    #[test]
    fn panicking_invoker_is_recorded_as_failure() {
        let invoker = |task: &SimulationTask| -> InvokeResult {
            if task.index == 1 {
                panic!("simulated invoker bug");
            }
            Ok(())
        };
        let dispatcher = Dispatcher::new(invoker, 2).unwrap();
        let report = dispatcher.run(tasks(3));
        assert_eq!(report.succeeded(), 2);
        assert_eq!(
            report.outcomes[1].error(),
            Some(&InvokeError::Panicked {
                message: "simulated invoker bug".to_string()
            })
        );
    }

    #[test]
    fn pre_cancelled_sweep_skips_everything() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let dispatcher = Dispatcher::new(succeed, 2)
            .unwrap()
            .with_cancel(cancel);
        let report = dispatcher.run(tasks(4));
        assert_eq!(report.total(), 4);
        assert_eq!(report.skipped(), 4);
        assert_eq!(report.peak_in_flight, 0);
        assert!(report.outcomes.iter().all(|o| o.worker.is_none()));
    }
}
