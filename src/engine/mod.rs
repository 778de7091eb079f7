//! Task orchestration.
//!
//! Build targets are described with two combinators:
//!
//! * [`Flow::sequence`]: every element starts after the previous element has
//!   completed, whether it succeeded or failed.
//! * [`Flow::parallel`]: elements start together, with no ordering between
//!   them.
//!
//! A [`Flow`] is lowered into a [`Plan`], a directed acyclic graph whose only
//! edge kind is *must precede*; two tasks without a path between them are
//! unconstrained. The plan is executed by [`runner`], a generic topological
//! executor that starts each task as soon as all its predecessors completed.
//!
//! ```rust,no_run
//! # use assetline::engine::Flow;
//! # fn demo(clean: Flow, base: Flow, layout: Flow) {
//! let plan = Flow::sequence([clean, Flow::parallel([base, layout])]).plan();
//! let report = plan.run();
//! assert!(report.is_success());
//! # }
//! ```

mod runner;

use std::sync::Arc;

use petgraph::Graph;
use petgraph::graph::NodeIndex;

use crate::task::Task;

pub use runner::{Report, StepReport};

/// Composition of tasks.
pub enum Flow {
    Task(Arc<dyn Task>),
    Sequence(Vec<Flow>),
    Parallel(Vec<Flow>),
}

impl Flow {
    pub fn task(task: impl Task + 'static) -> Self {
        Flow::Task(Arc::new(task))
    }

    pub fn sequence(flows: impl IntoIterator<Item = Flow>) -> Self {
        Flow::Sequence(flows.into_iter().collect())
    }

    pub fn parallel(flows: impl IntoIterator<Item = Flow>) -> Self {
        Flow::Parallel(flows.into_iter().collect())
    }

    pub fn plan(self) -> Plan {
        Plan::new(self)
    }
}

/// The edge kind of a [`Plan`]: source must complete before target starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precedes;

/// A flow lowered into a task graph, ready to run.
pub struct Plan {
    pub(crate) graph: Graph<Arc<dyn Task>, Precedes>,
}

impl Plan {
    pub fn new(flow: Flow) -> Self {
        let mut graph = Graph::new();
        lower(&mut graph, flow);
        Self { graph }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Names of the tasks that must complete before `name` starts, directly.
    pub fn predecessors(&self, name: &str) -> Vec<&str> {
        let Some(index) = self.find(name) else {
            return vec![];
        };

        let mut names: Vec<_> = self
            .graph
            .neighbors_directed(index, petgraph::Direction::Incoming)
            .map(|i| self.graph[i].name())
            .collect();
        names.sort();
        names
    }

    fn find(&self, name: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&i| self.graph[i].name() == name)
    }

    /// Runs every task of the plan on the worker pool.
    pub fn run(&self) -> Report {
        runner::run(self)
    }
}

/// Adds `flow` to `graph`, returning its entry and exit nodes.
fn lower(
    graph: &mut Graph<Arc<dyn Task>, Precedes>,
    flow: Flow,
) -> (Vec<NodeIndex>, Vec<NodeIndex>) {
    match flow {
        Flow::Task(task) => {
            let index = graph.add_node(task);
            (vec![index], vec![index])
        }
        Flow::Parallel(flows) => {
            let mut sources = Vec::new();
            let mut sinks = Vec::new();

            for flow in flows {
                let (s, t) = lower(graph, flow);
                sources.extend(s);
                sinks.extend(t);
            }

            (sources, sinks)
        }
        Flow::Sequence(flows) => {
            let mut sources: Option<Vec<NodeIndex>> = None;
            let mut sinks: Vec<NodeIndex> = Vec::new();

            for flow in flows {
                let (s, t) = lower(graph, flow);
                if s.is_empty() {
                    continue;
                }

                for &from in &sinks {
                    for &to in &s {
                        graph.add_edge(from, to, Precedes);
                    }
                }

                sources.get_or_insert(s);
                sinks = t;
            }

            (sources.unwrap_or_default(), sinks)
        }
    }
}
