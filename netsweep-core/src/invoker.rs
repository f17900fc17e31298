//! Running a single task as an external process.
//!
//! The [`Invoker`] trait is the seam between the dispatcher and the outside
//! world. [`ProcessInvoker`] is the production implementation: it builds an
//! argument vector for the task, starts the simulator without going through
//! a shell and blocks until the process exits.
//!
//! [`Invoker`]: trait.Invoker.html
//! [`ProcessInvoker`]: struct.ProcessInvoker.html

use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::config::{LauncherConfig, OutputMode};
use crate::error::{Error, Result};
use crate::task::SimulationTask;

/// How often a running child is checked for exit, cancellation and timeout.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Reason a single task didn't succeed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    #[error("failed to start `{program}`: {reason}")]
    Spawn { program: String, reason: String },
    #[error("exited with status {code}")]
    NonZeroExit { code: i32 },
    #[error("terminated by signal {signal}")]
    SignalTermination { signal: i32 },
    #[error("failed waiting for process: {reason}")]
    Wait { reason: String },
    #[error("timed out after {after:?}")]
    TimedOut { after: Duration },
    #[error("cancelled")]
    Cancelled,
    #[error("invoker panicked: {message}")]
    Panicked { message: String },
}

impl InvokeError {
    /// Short machine friendly name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            InvokeError::Spawn { .. } => "spawn_error",
            InvokeError::NonZeroExit { .. } => "non_zero_exit",
            InvokeError::SignalTermination { .. } => "signal_termination",
            InvokeError::Wait { .. } => "wait_error",
            InvokeError::TimedOut { .. } => "timed_out",
            InvokeError::Cancelled => "cancelled",
            InvokeError::Panicked { .. } => "panicked",
        }
    }
}

/// Executes one task and reports how it ended.
///
/// Implementations block the calling worker until the task is done. They
/// must report failures through the returned value rather than panicking.
pub trait Invoker: Sync {
    fn invoke(&self, task: &SimulationTask) -> std::result::Result<(), InvokeError>;
}

impl<F> Invoker for F
where
    F: Fn(&SimulationTask) -> std::result::Result<(), InvokeError> + Sync,
{
    fn invoke(&self, task: &SimulationTask) -> std::result::Result<(), InvokeError> {
        self(task)
    }
}

/// Starts the simulator as a child process, one per task.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    launcher: LauncherConfig,
    cancel: CancelToken,
    poll_interval: Duration,
}

impl ProcessInvoker {
    pub fn new(launcher: LauncherConfig, cancel: CancelToken) -> Self {
        ProcessInvoker {
            launcher,
            cancel,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn launcher(&self) -> &LauncherConfig {
        &self.launcher
    }

    /// Named task parameters, one argument each.
    pub fn task_args(&self, task: &SimulationTask) -> Vec<String> {
        let flags = &self.launcher.flags;
        vec![
            format!("{}={}", flags.index, task.index),
            format!("{}={}", flags.name, task.scenario_name),
            format!("{}={}", flags.routing, task.routing),
            format!("{}={}", flags.topology, task.topology),
            format!("{}={}", flags.node_count, task.node_count),
        ]
    }

    /// Full argument vector passed to the launcher program.
    pub fn args(&self, task: &SimulationTask) -> Result<Vec<String>> {
        let mut args = self.launcher.prefix_args.clone();
        let task_args = self.task_args(task);
        match &self.launcher.wrap {
            Some(target) => {
                let words = std::iter::once(target.as_str())
                    .chain(task_args.iter().map(|s| s.as_str()));
                let joined = shlex::try_join(words)
                    .map_err(|_| Error::UnquotableArgument(task_args.join(" ")))?;
                args.push(joined);
            }
            None => args.extend(task_args),
        }
        Ok(args)
    }

    pub fn command(&self, task: &SimulationTask) -> Result<Command> {
        let mut command = Command::new(&self.launcher.program);
        command.args(self.args(task)?);
        if let Some(dir) = &self.launcher.working_dir {
            command.current_dir(dir);
        }
        if self.launcher.output == OutputMode::Null {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        command.stdin(Stdio::null());
        // keep terminal signals (Ctrl-C) away from the children, the
        // dispatcher decides what happens to them
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        Ok(command)
    }

    /// Command line for the task, quoted so it can be pasted into a shell.
    pub fn render_command(&self, task: &SimulationTask) -> Result<String> {
        let args = self.args(task)?;
        let words = std::iter::once(self.launcher.program.as_str())
            .chain(args.iter().map(|s| s.as_str()));
        shlex::try_join(words).map_err(|_| Error::UnquotableArgument(args.join(" ")))
    }

    fn wait(&self, child: &mut Child) -> std::result::Result<ExitStatus, InvokeError> {
        let started = Instant::now();
        let timeout = self.launcher.timeout();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => (),
                Err(e) => {
                    kill_and_reap(child);
                    return Err(InvokeError::Wait {
                        reason: e.to_string(),
                    });
                }
            }
            if self.cancel.is_cancelled() {
                kill_and_reap(child);
                return Err(InvokeError::Cancelled);
            }
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    kill_and_reap(child);
                    return Err(InvokeError::TimedOut { after: limit });
                }
            }
            thread::sleep(self.poll_interval);
        }
    }
}

impl Invoker for ProcessInvoker {
    fn invoke(&self, task: &SimulationTask) -> std::result::Result<(), InvokeError> {
        let spawn_error = |reason: String| InvokeError::Spawn {
            program: self.launcher.program.clone(),
            reason,
        };
        let mut command = self.command(task).map_err(|e| spawn_error(e.to_string()))?;
        if self.cancel.is_cancelled() {
            return Err(InvokeError::Cancelled);
        }
        debug!("{}: spawning {:?}", task.label(), command);
        let mut child = command.spawn().map_err(|e| spawn_error(e.to_string()))?;
        trace!("{}: child pid {}", task.label(), child.id());
        let status = self.wait(&mut child)?;
        if !status.success() && self.cancel.is_cancelled() {
            debug!("{}: exited with {} after cancellation", task.label(), status);
            return Err(InvokeError::Cancelled);
        }
        exit_status_result(status)
    }
}

fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("failed killing child {}: {}", child.id(), e);
    }
    if let Err(e) = child.wait() {
        debug!("failed reaping child {}: {}", child.id(), e);
    }
}

fn exit_status_result(status: ExitStatus) -> std::result::Result<(), InvokeError> {
    if status.success() {
        return Ok(());
    }
    if let Some(code) = status.code() {
        return Err(InvokeError::NonZeroExit { code });
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Err(InvokeError::SignalTermination { signal });
        }
    }
    Err(InvokeError::Wait {
        reason: format!("unrecognized exit status: {}", status),
    })
}
