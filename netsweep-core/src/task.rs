//! Sweep points and the enumerated simulation parameters.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const AODV_NAME: &str = "aodv";
const DSR_NAME: &str = "dsr";
const OLSR_NAME: &str = "olsr";
const DSDV_NAME: &str = "dsdv";

const GRID_NAME: &str = "grid";
const DISC_NAME: &str = "disc";

/// Routing algorithm used by the simulated network.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingProtocol {
    /// Ad hoc On-Demand Distance Vector
    Aodv,
    /// Dynamic Source Routing
    Dsr,
    /// Optimized Link State Routing
    Olsr,
    /// Destination-Sequenced Distance Vector
    Dsdv,
}

impl RoutingProtocol {
    pub const ALL: [RoutingProtocol; 4] = [
        RoutingProtocol::Aodv,
        RoutingProtocol::Dsr,
        RoutingProtocol::Olsr,
        RoutingProtocol::Dsdv,
    ];

    /// Name understood by the simulator's command line.
    pub fn to_str(&self) -> &'static str {
        match self {
            RoutingProtocol::Aodv => AODV_NAME,
            RoutingProtocol::Dsr => DSR_NAME,
            RoutingProtocol::Olsr => OLSR_NAME,
            RoutingProtocol::Dsdv => DSDV_NAME,
        }
    }
}

impl Default for RoutingProtocol {
    fn default() -> Self {
        RoutingProtocol::Aodv
    }
}

impl FromStr for RoutingProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let routing = match s.trim().to_lowercase().as_str() {
            AODV_NAME => RoutingProtocol::Aodv,
            DSR_NAME => RoutingProtocol::Dsr,
            OLSR_NAME => RoutingProtocol::Olsr,
            DSDV_NAME => RoutingProtocol::Dsdv,
            _ => return Err(Error::InvalidRoutingProtocol(s.to_string())),
        };
        Ok(routing)
    }
}

impl fmt::Display for RoutingProtocol {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}", self.to_str())
    }
}

/// Shape of the simulated network.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Nodes placed on a regular grid
    Grid,
    /// Nodes randomly deployed on a disc shaped plane
    Disc,
}

impl Topology {
    pub const ALL: [Topology; 2] = [Topology::Grid, Topology::Disc];

    /// Name understood by the simulator's command line.
    pub fn to_str(&self) -> &'static str {
        match self {
            Topology::Grid => GRID_NAME,
            Topology::Disc => DISC_NAME,
        }
    }
}

impl FromStr for Topology {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let topology = match s.trim().to_lowercase().as_str() {
            GRID_NAME => Topology::Grid,
            DISC_NAME => Topology::Disc,
            _ => return Err(Error::InvalidTopology(s.to_string())),
        };
        Ok(topology)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}", self.to_str())
    }
}

/// One fully specified simulation configuration.
///
/// Tasks are created by the [`ParameterGenerator`] and never change
/// afterwards. `index` is the position of `node_count` within the swept
/// node-count list, so all topologies sharing a node count also share the
/// index. It is a property of the generation order and shouldn't be used
/// as a task identity.
///
/// [`ParameterGenerator`]: ../generator/struct.ParameterGenerator.html
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimulationTask {
    pub index: u32,
    pub scenario_name: String,
    pub routing: RoutingProtocol,
    pub topology: Topology,
    pub node_count: u32,
}

impl SimulationTask {
    pub fn new(
        index: u32,
        scenario_name: impl Into<String>,
        routing: RoutingProtocol,
        topology: Topology,
        node_count: u32,
    ) -> Self {
        Self {
            index,
            scenario_name: scenario_name.into(),
            routing,
            topology,
            node_count,
        }
    }

    /// Short human readable description used in logs.
    pub fn label(&self) -> String {
        format!(
            "{}#{}/{}/{}/{}",
            self.scenario_name, self.index, self.routing, self.topology, self.node_count
        )
    }
}
