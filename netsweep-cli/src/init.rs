//! Creating new sweep configuration files.

use std::fs;
use std::path::Path;

use netsweep::Error;

/// Commented configuration listing every setting with its default value.
pub const TEMPLATE: &str = r#"# Sweep configuration for `netsweep`.
#
# Every setting is optional, the values below are the defaults.

[sweep]
# Label passed to every simulation of the sweep.
name = "theName"
# Maximum number of simulations running at the same time.
workers = 6
# Network sizes to simulate, in order. A task's index is the position of its
# node count in this list.
node_counts = [10, 20, 40, 60, 80, 100, 150, 200]
# One of: aodv, dsr, olsr, dsdv.
routing = "aodv"
# Any of: grid, disc. Each node count is simulated once per topology.
topologies = ["grid", "disc"]

[launcher]
# Program started for every task, followed by `prefix_args`.
program = "./waf"
prefix_args = ["--run"]
# With `wrap` set, the simulator name and the task parameters are passed as
# a single quoted argument, as in `./waf --run "onion-routing-wsn --name=..."`.
# Remove it to pass every parameter as a separate argument.
wrap = "onion-routing-wsn"
# Directory the program is started in, defaults to the current one.
# working_dir = "../ns-3"
# Kill a simulation after this many milliseconds, 0 means no limit.
# timeout_ms = 3600000
# What to do with simulator output: inherit or null.
output = "inherit"

# Flags used to pass task parameters, each given as `<flag>=<value>`.
[launcher.flags]
index = "--sim-index"
name = "--name"
routing = "--routing"
topology = "--topology"
node_count = "--node-count"
"#;

/// Writes the template to `path`. Existing files are left untouched.
pub fn write_template(path: &Path) -> netsweep::Result<()> {
    if path.exists() {
        return Err(Error::ConfigExists(path.display().to_string()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, TEMPLATE)?;
    Ok(())
}
