//! This library implements parallel dispatch of simulation sweeps.
//!
//! A sweep is the cross product of a few parameter axes (node counts and
//! network topologies, at a fixed routing protocol). Every point of the
//! sweep becomes one [`SimulationTask`], and every task becomes exactly one
//! invocation of an external simulator process.
//!
//! The programming interface is made of three pieces:
//!
//! - [`ParameterGenerator`] turns a [`Sweep`] into an ordered task list,
//! - [`Dispatcher`] runs the task list on a fixed number of worker threads,
//!   never letting more than that many invocations be in flight,
//! - [`ProcessInvoker`] starts the simulator for a single task and turns its
//!   exit status into an outcome.
//!
//! Outcomes are collected into a [`SweepReport`] once every task reached a
//! terminal state. A failing task never prevents the others from running.
//!
//! # Example
//!
//! ```ignore
//! use netsweep_core::{run_sweep, CancelToken, SweepConfig};
//!
//! let config = SweepConfig::from_path("sweep.toml")?;
//! let report = run_sweep(&config, CancelToken::new())?;
//! println!("{} of {} tasks failed", report.failed(), report.total());
//! ```
//!
//! [`SimulationTask`]: task/struct.SimulationTask.html
//! [`ParameterGenerator`]: generator/struct.ParameterGenerator.html
//! [`Sweep`]: config/struct.Sweep.html
//! [`Dispatcher`]: dispatch/struct.Dispatcher.html
//! [`ProcessInvoker`]: invoker/struct.ProcessInvoker.html
//! [`SweepReport`]: report/struct.SweepReport.html

#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

// reexports
pub use cancel::CancelToken;
pub use config::{ArgFlags, LauncherConfig, OutputMode, Sweep, SweepConfig};
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use generator::ParameterGenerator;
pub use invoker::{InvokeError, Invoker, ProcessInvoker};
pub use report::{SweepReport, TaskOutcome, TaskStatus};
pub use task::{RoutingProtocol, SimulationTask, Topology};

pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod generator;
pub mod invoker;
pub mod report;
pub mod task;

/// Name of the sweep configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "sweep.toml";

/// Number of workers used when the configuration doesn't specify it.
pub const DEFAULT_WORKERS: usize = 6;
/// Scenario name used when the configuration doesn't specify it.
pub const DEFAULT_SCENARIO_NAME: &str = "theName";
/// Node counts swept when the configuration doesn't specify them.
pub const DEFAULT_NODE_COUNTS: &[u32] = &[10, 20, 40, 60, 80, 100, 150, 200];

/// Validates the configuration, generates the task list and runs it to
/// completion using a [`ProcessInvoker`].
///
/// Fails only on invalid configuration. Task failures are reported through
/// the returned [`SweepReport`].
///
/// [`ProcessInvoker`]: invoker/struct.ProcessInvoker.html
/// [`SweepReport`]: report/struct.SweepReport.html
pub fn run_sweep(config: &SweepConfig, cancel: CancelToken) -> Result<SweepReport> {
    config.validate()?;
    let tasks = ParameterGenerator::new(&config.sweep).generate();
    info!(
        "sweep \"{}\": {} tasks on {} workers",
        config.sweep.name,
        tasks.len(),
        config.sweep.workers
    );
    let invoker = ProcessInvoker::new(config.launcher.clone(), cancel.clone());
    let dispatcher = Dispatcher::new(invoker, config.sweep.workers)?.with_cancel(cancel);
    Ok(dispatcher.run(tasks))
}
