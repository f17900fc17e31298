//! Expansion of sweep axes into tasks.

use crate::config::Sweep;
use crate::task::{RoutingProtocol, SimulationTask, Topology};

/// Produces the ordered task list for a sweep.
///
/// For each node count, in list order, and for each topology, in configured
/// order, exactly one task is emitted. The task's `index` is the position of
/// its node count in the list. Output is fully determined by the inputs.
///
/// Inputs are expected to be validated beforehand, see
/// [`Sweep::validate`](../config/struct.Sweep.html#method.validate).
#[derive(Debug, Clone)]
pub struct ParameterGenerator<'a> {
    scenario_name: &'a str,
    node_counts: &'a [u32],
    routing: RoutingProtocol,
    topologies: &'a [Topology],
}

impl<'a> ParameterGenerator<'a> {
    pub fn new(sweep: &'a Sweep) -> Self {
        ParameterGenerator {
            scenario_name: &sweep.name,
            node_counts: &sweep.node_counts,
            routing: sweep.routing,
            topologies: &sweep.topologies,
        }
    }

    pub fn from_parts(
        scenario_name: &'a str,
        node_counts: &'a [u32],
        routing: RoutingProtocol,
        topologies: &'a [Topology],
    ) -> Self {
        ParameterGenerator {
            scenario_name,
            node_counts,
            routing,
            topologies,
        }
    }

    /// Number of tasks that will be generated.
    pub fn len(&self) -> usize {
        self.node_counts.len() * self.topologies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = SimulationTask> + 'a {
        let scenario_name = self.scenario_name;
        let routing = self.routing;
        let topologies = self.topologies;
        let node_counts = self.node_counts;
        node_counts
            .iter()
            .enumerate()
            .flat_map(move |(index, &node_count)| {
                topologies.iter().map(move |&topology| {
                    SimulationTask::new(index as u32, scenario_name, routing, topology, node_count)
                })
            })
    }

    pub fn generate(&self) -> Vec<SimulationTask> {
        self.iter().collect()
    }
}
