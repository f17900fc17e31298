//! Sweep configuration.
//!
//! Configuration is a plain value passed into the generator and the
//! dispatcher. It's usually read from a `sweep.toml` file:
//!
//! ```toml
//! [sweep]
//! name = "theName"
//! workers = 6
//! node_counts = [10, 20, 40]
//! routing = "aodv"
//! topologies = ["grid", "disc"]
//!
//! [launcher]
//! program = "./waf"
//! prefix_args = ["--run"]
//! wrap = "onion-routing-wsn"
//! ```
//!
//! Every field is optional, missing ones take their default values.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::task::{RoutingProtocol, Topology};

const DEFAULT_PROGRAM: &str = "./waf";
const DEFAULT_PREFIX_ARGS: &[&str] = &["--run"];
const DEFAULT_WRAP_TARGET: &str = "onion-routing-wsn";

/// Complete configuration of a single sweep run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub sweep: Sweep,
    pub launcher: LauncherConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            sweep: Sweep::default(),
            launcher: LauncherConfig::default(),
        }
    }
}

impl SweepConfig {
    /// Reads configuration from a toml file at the given path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<SweepConfig> {
        let path = path.as_ref();
        debug!("reading sweep config from {}", path.display());
        let file_str = fs::read_to_string(path)
            .map_err(|e| Error::IoError(format!("{}: {}", path.display(), e)))?;
        SweepConfig::from_toml(&file_str)
    }

    pub fn from_toml(s: &str) -> Result<SweepConfig> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Checks the configuration for conditions that would make the sweep
    /// meaningless. Nothing is spawned for a configuration that fails here.
    pub fn validate(&self) -> Result<()> {
        self.sweep.validate()?;
        self.launcher.validate()?;
        Ok(())
    }
}

/// Parameter axes of the sweep, together with the worker count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Sweep {
    /// Label shared by all tasks of the sweep
    pub name: String,
    /// Maximum number of simulations running at the same time
    pub workers: usize,
    /// Network sizes, in sweep order
    pub node_counts: Vec<u32>,
    /// Routing protocol used for every task
    pub routing: RoutingProtocol,
    /// Topologies, in the order they're emitted for each node count
    pub topologies: Vec<Topology>,
}

impl Default for Sweep {
    fn default() -> Self {
        Sweep {
            name: crate::DEFAULT_SCENARIO_NAME.to_string(),
            workers: crate::DEFAULT_WORKERS,
            node_counts: crate::DEFAULT_NODE_COUNTS.to_vec(),
            routing: RoutingProtocol::default(),
            topologies: Topology::ALL.to_vec(),
        }
    }
}

impl Sweep {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig("scenario name is empty".to_string()));
        }
        if self.workers < 1 {
            return Err(Error::InvalidConfig(format!(
                "worker count must be at least 1, got {}",
                self.workers
            )));
        }
        if self.node_counts.is_empty() {
            return Err(Error::InvalidConfig("node count list is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for node_count in &self.node_counts {
            if *node_count == 0 {
                return Err(Error::InvalidConfig(
                    "node counts must be positive, got 0".to_string(),
                ));
            }
            if !seen.insert(node_count) {
                return Err(Error::InvalidConfig(format!(
                    "node count {} is listed more than once",
                    node_count
                )));
            }
        }
        if self.topologies.is_empty() {
            return Err(Error::InvalidConfig("topology list is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for topology in &self.topologies {
            if !seen.insert(topology) {
                return Err(Error::InvalidConfig(format!(
                    "topology {} is listed more than once",
                    topology
                )));
            }
        }
        Ok(())
    }

    /// Number of tasks the sweep expands to.
    pub fn task_count(&self) -> usize {
        self.node_counts.len() * self.topologies.len()
    }
}

/// What happens to the simulator's standard output and error streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Share the terminal with the dispatcher
    Inherit,
    /// Discard all simulator output
    Null,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Inherit
    }
}

/// Names of the flags carrying task parameters to the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArgFlags {
    pub index: String,
    pub name: String,
    pub routing: String,
    pub topology: String,
    pub node_count: String,
}

impl Default for ArgFlags {
    fn default() -> Self {
        ArgFlags {
            index: "--sim-index".to_string(),
            name: "--name".to_string(),
            routing: "--routing".to_string(),
            topology: "--topology".to_string(),
            node_count: "--node-count".to_string(),
        }
    }
}

impl ArgFlags {
    fn validate(&self) -> Result<()> {
        let flags = [
            ("index", &self.index),
            ("name", &self.name),
            ("routing", &self.routing),
            ("topology", &self.topology),
            ("node_count", &self.node_count),
        ];
        for (key, flag) in flags.iter() {
            if flag.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "launcher flag for `{}` is empty",
                    key
                )));
            }
        }
        Ok(())
    }
}

/// Describes how the simulator process is started.
///
/// The command is `program`, then `prefix_args`, then the task parameters.
/// With `wrap` set, the parameters are preceded by the wrap target and
/// passed as a single, shell-quoted argument. That's the form expected by
/// build/run wrappers like `./waf --run "<target> <args>"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    pub program: String,
    pub prefix_args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Per-task time limit in milliseconds, 0 means no limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub output: OutputMode,
    pub flags: ArgFlags,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        LauncherConfig {
            program: DEFAULT_PROGRAM.to_string(),
            prefix_args: DEFAULT_PREFIX_ARGS.iter().map(|s| s.to_string()).collect(),
            wrap: Some(DEFAULT_WRAP_TARGET.to_string()),
            working_dir: None,
            timeout_ms: None,
            output: OutputMode::default(),
            flags: ArgFlags::default(),
        }
    }
}

impl LauncherConfig {
    /// Launcher running `program` directly, with no prefix arguments.
    pub fn direct(program: impl Into<String>) -> Self {
        LauncherConfig {
            program: program.into(),
            prefix_args: Vec::new(),
            wrap: None,
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_ms {
            // 0 means no limit
            Some(0) | None => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(Error::InvalidConfig("launcher program is empty".to_string()));
        }
        if let Some(target) = &self.wrap {
            if target.trim().is_empty() {
                return Err(Error::InvalidConfig("launcher wrap target is empty".to_string()));
            }
        }
        self.flags.validate()
    }
}
