//! Step dependency graph.
//!
//! The six generator steps form a fixed DAG:
//!
//! ```text
//! binning -> draws -> materialization ┐
//!                  -> hydro           ├-> temporal_scenario
//!                  -> availability    ┘
//! ```
//!
//! A run selects a subset; the plan orders that subset topologically and
//! records which unselected upstream steps must be satisfied from outputs a
//! previous run already wrote.

use std::collections::{BTreeSet, HashMap};

use anyhow::{anyhow, Result};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use petgraph::visit::Bfs;
use ra_core::PipelineStep;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    order: Vec<PipelineStep>,
    reused: Vec<PipelineStep>,
}

impl StepPlan {
    /// Selected steps in execution order.
    pub fn order(&self) -> &[PipelineStep] {
        &self.order
    }

    /// Unselected steps whose previous output feeds a selected step.
    pub fn reused(&self) -> &[PipelineStep] {
        &self.reused
    }

    pub fn runs(&self, step: PipelineStep) -> bool {
        self.order.contains(&step)
    }
}

fn step_graph() -> (DiGraph<PipelineStep, ()>, HashMap<PipelineStep, petgraph::graph::NodeIndex>) {
    let mut graph = DiGraph::new();
    let nodes: HashMap<_, _> = PipelineStep::ALL
        .iter()
        .map(|step| (*step, graph.add_node(*step)))
        .collect();
    for step in PipelineStep::ALL {
        for dep in step.dependencies() {
            graph.add_edge(nodes[dep], nodes[&step], ());
        }
    }
    (graph, nodes)
}

pub fn plan_steps(selected: &BTreeSet<PipelineStep>) -> Result<StepPlan> {
    if selected.is_empty() {
        return Err(anyhow!("no pipeline step selected"));
    }
    let (graph, _) = step_graph();
    let sorted = toposort(&graph, None)
        .map_err(|cycle| anyhow!("pipeline step graph has a cycle at {}", graph[cycle.node_id()]))?;
    let order: Vec<PipelineStep> = sorted
        .into_iter()
        .map(|idx| graph[idx])
        .filter(|step| selected.contains(step))
        .collect();
    let reused: BTreeSet<PipelineStep> = order
        .iter()
        .flat_map(|step| step.dependencies().iter().copied())
        .filter(|dep| !selected.contains(dep))
        .collect();
    Ok(StepPlan {
        order,
        reused: reused.into_iter().collect(),
    })
}

/// `step` followed by every step that consumes its output, directly or not.
pub fn step_and_dependents(step: PipelineStep) -> Vec<PipelineStep> {
    let (graph, nodes) = step_graph();
    let mut bfs = Bfs::new(&graph, nodes[&step]);
    let mut reached = Vec::new();
    while let Some(idx) = bfs.next(&graph) {
        reached.push(graph[idx]);
    }
    reached
}
