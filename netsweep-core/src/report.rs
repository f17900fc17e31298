//! Outcomes of a finished sweep.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::invoker::InvokeError;
use crate::task::SimulationTask;

/// Terminal state of a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Process exited with status 0
    Succeeded,
    /// Process couldn't be started or didn't exit cleanly
    Failed(InvokeError),
    /// Task was never started because the sweep got cancelled
    Skipped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed(_) => "failed",
            TaskStatus::Skipped => "skipped",
        }
    }
}

/// Task together with its terminal state.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: SimulationTask,
    pub status: TaskStatus,
    /// Time spent inside the invoker
    pub elapsed: Duration,
    /// Worker slot that handled the task, `None` if it never started
    pub worker: Option<usize>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }

    pub fn error(&self) -> Option<&InvokeError> {
        match &self.status {
            TaskStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Per-task outcomes of a sweep run, in task submission order.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub workers: usize,
    /// Highest number of invocations observed in flight at the same time
    pub peak_in_flight: usize,
    pub outcomes: Vec<TaskOutcome>,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| *s == TaskStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, TaskStatus::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| *s == TaskStatus::Skipped)
    }

    /// True if every task ran and succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TaskStatus::Failed(_)))
    }

    fn count<F: Fn(&TaskStatus) -> bool>(&self, f: F) -> usize {
        self.outcomes.iter().filter(|o| f(&o.status)).count()
    }

    pub fn to_file(&self) -> ReportFile {
        ReportFile {
            started_at: self.started_at,
            elapsed_ms: self.elapsed.as_millis() as u64,
            workers: self.workers,
            peak_in_flight: self.peak_in_flight,
            total: self.total(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            skipped: self.skipped(),
            tasks: self
                .outcomes
                .iter()
                .map(|o| ReportEntry {
                    index: o.task.index,
                    scenario_name: o.task.scenario_name.clone(),
                    routing: o.task.routing.to_string(),
                    topology: o.task.topology.to_string(),
                    node_count: o.task.node_count,
                    status: o.status.as_str().to_string(),
                    kind: o.error().map(|e| e.kind().to_string()),
                    detail: o.error().map(|e| e.to_string()),
                    elapsed_ms: o.elapsed.as_millis() as u64,
                    worker: o.worker,
                })
                .collect(),
        }
    }

    /// Writes the report to a toml file.
    pub fn write_toml(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = toml::to_string(&self.to_file())?;
        fs::write(path, text)?;
        Ok(())
    }
}

/// Serializable form of the [`SweepReport`].
///
/// [`SweepReport`]: struct.SweepReport.html
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFile {
    pub started_at: DateTime<Local>,
    pub elapsed_ms: u64,
    pub workers: usize,
    pub peak_in_flight: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub tasks: Vec<ReportEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub index: u32,
    pub scenario_name: String,
    pub routing: String,
    pub topology: String,
    pub node_count: u32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{RoutingProtocol, Topology};

    fn outcome(node_count: u32, status: TaskStatus) -> TaskOutcome {
        let worker = match status {
            TaskStatus::Skipped => None,
            _ => Some(0),
        };
        TaskOutcome {
            task: SimulationTask::new(0, "theName", RoutingProtocol::Aodv, Topology::Grid, node_count),
            status,
            elapsed: Duration::from_millis(12),
            worker,
        }
    }

    fn report() -> SweepReport {
        SweepReport {
            started_at: Local::now(),
            elapsed: Duration::from_secs(1),
            workers: 2,
            peak_in_flight: 2,
            outcomes: vec![
                outcome(10, TaskStatus::Succeeded),
                outcome(20, TaskStatus::Failed(InvokeError::NonZeroExit { code: 1 })),
                outcome(40, TaskStatus::Skipped),
            ],
        }
    }

    #[test]
    fn counts_add_up() {
        let report = report();
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn report_file_describes_failures() {
        let file = report().to_file();
        assert_eq!(file.tasks.len(), 3);
        assert_eq!(file.tasks[0].kind, None);
        assert_eq!(file.tasks[1].status, "failed");
        assert_eq!(file.tasks[1].kind.as_deref(), Some("non_zero_exit"));
        assert_eq!(file.tasks[1].detail.as_deref(), Some("exited with status 1"));
        assert_eq!(file.tasks[2].status, "skipped");
        assert_eq!(file.tasks[0].worker, Some(0));
        assert_eq!(file.tasks[2].worker, None);
    }

    #[test]
    fn report_is_written_as_toml() {
        let path = std::env::temp_dir().join(format!(
            "netsweep-report-{}.toml",
            std::process::id()
        ));
        report().write_toml(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();
        // skipped tasks never ran on a worker
        assert_eq!(text.matches("worker = ").count(), 2);
        let file: ReportFile = toml::from_str(&text).unwrap();
        assert_eq!(file.failed, 1);
        assert_eq!(file.tasks[1].node_count, 20);
        assert_eq!(file.tasks[2].worker, None);
    }
}
