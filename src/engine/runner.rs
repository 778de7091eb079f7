use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use indicatif::ProgressStyle;
use petgraph::Graph;
use petgraph::graph::NodeIndex;
use tracing::Level;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::engine::{Plan, Precedes};
use crate::error::TaskError;
use crate::task::Task;

/// Outcome of a single task of a run.
#[derive(Debug)]
pub struct StepReport {
    pub name: String,
    pub start: Instant,
    pub duration: Duration,
    pub error: Option<TaskError>,
}

impl StepReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn end(&self) -> Instant {
        self.start + self.duration
    }
}

/// Result of running a [`Plan`], steps in order of completion.
#[derive(Debug, Default)]
pub struct Report {
    pub steps: Vec<StepReport>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(StepReport::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|step| !step.is_success())
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|step| step.name == name)
    }
}

fn style_task() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn style_root() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown payload")
    }
}

/// State shared by every job of one run.
struct Shared<'g> {
    graph: &'g Graph<Arc<dyn Task>, Precedes>,
    dependents: HashMap<NodeIndex, Vec<NodeIndex>>,
    pending: HashMap<NodeIndex, AtomicUsize>,
    steps: Mutex<Vec<StepReport>>,
    root: tracing::Span,
    style: ProgressStyle,
}

/// Executes the plan on the rayon pool, as a parallel topological sort.
///
/// 1. Every task without predecessors is spawned into a scope.
/// 2. A finished job records its step, then decrements the pending count of
///    every dependent, whether it succeeded or not.
/// 3. The job that brings a count to zero spawns that dependent itself.
/// 4. The scope returns once no job is left.
///
/// No worker ever blocks waiting for another job, so the run makes progress
/// on a pool of any size. Failures are collected in the [`Report`], they
/// never stop the run.
pub(crate) fn run(plan: &Plan) -> Report {
    let graph = &plan.graph;
    let total = graph.node_count();

    if total == 0 {
        return Report::default();
    }

    let mut dependents: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
    for edge in graph.raw_edges() {
        dependents
            .entry(edge.source())
            .or_default()
            .push(edge.target());
    }

    let pending: HashMap<NodeIndex, AtomicUsize> = graph
        .node_indices()
        .map(|i| {
            let count = graph
                .neighbors_directed(i, petgraph::Direction::Incoming)
                .count();
            (i, AtomicUsize::new(count))
        })
        .collect();

    let root = tracing::span!(Level::INFO, "run");
    root.pb_set_style(&style_root());
    root.pb_set_length(total as u64);
    root.pb_set_message("Running tasks...");

    let shared = Shared {
        graph,
        dependents,
        pending,
        steps: Mutex::new(Vec::with_capacity(total)),
        root,
        style: style_task(),
    };

    rayon::scope(|s| {
        for index in graph.node_indices() {
            if shared.pending[&index].load(Ordering::Acquire) == 0 {
                spawn_task(s, &shared, index);
            }
        }
    });

    let report = Report {
        steps: shared
            .steps
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner),
    };

    let failed = report.failures().count();
    match failed {
        0 => tracing::info!("Finished {} task(s)", total),
        _ => tracing::warn!("Finished {} task(s), {} failed", total, failed),
    }

    report
}

fn spawn_task<'s, 'g: 's>(s: &rayon::Scope<'s>, shared: &'s Shared<'g>, index: NodeIndex) {
    s.spawn(move |s| {
        let task = &shared.graph[index];

        let span = tracing::span!(parent: &shared.root, Level::INFO, "task", name = task.name());
        span.pb_set_style(&shared.style);
        span.pb_set_message(&format!("Running {}", task.name()));
        let enter = span.enter();

        let start = Instant::now();

        // Tasks share nothing mutable, a panic cannot leave another
        // task's state half-updated.
        let result = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| task.run())) {
            Ok(result) => result,
            Err(panic) => Err(TaskError::Panic(panic_message(panic))),
        };

        let duration = start.elapsed();
        drop(enter);

        if let Err(e) = &result {
            tracing::error!(step = %task.name(), "{e}");
        }

        shared
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StepReport {
                name: task.name().to_string(),
                start,
                duration,
                error: result.err(),
            });
        shared.root.pb_inc(1);

        for &next in shared.dependents.get(&index).into_iter().flatten() {
            if shared.pending[&next].fetch_sub(1, Ordering::AcqRel) == 1 {
                spawn_task(s, shared, next);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::engine::Flow;
    use crate::engine::tests::{Probe, position};

    #[test]
    fn test_sequence_orders_steps() {
        let journal: Arc<Mutex<Vec<String>>> = Arc::default();
        let report = Flow::sequence([
            Flow::parallel([Probe::flow("clean-a", &journal), Probe::flow("clean-b", &journal)]),
            Flow::parallel([Probe::flow("build-a", &journal), Probe::flow("build-b", &journal)]),
        ])
        .plan()
        .run();

        assert!(report.is_success());
        assert_eq!(report.steps.len(), 4);

        let journal = journal.lock().unwrap();
        for clean in ["clean-a", "clean-b"] {
            for build in ["build-a", "build-b"] {
                assert!(
                    position(&journal, &format!("end:{clean}"))
                        < position(&journal, &format!("start:{build}"))
                );
            }
        }
    }

    #[test]
    fn test_failure_does_not_stop_sequence() {
        let journal: Arc<Mutex<Vec<String>>> = Arc::default();
        let report = Flow::sequence([
            Probe::failing("broken", &journal),
            Flow::parallel([Probe::flow("after-1", &journal), Probe::flow("after-2", &journal)]),
        ])
        .plan()
        .run();

        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
        assert!(report.step("broken").is_some_and(|s| !s.is_success()));
        assert!(report.step("after-1").is_some_and(StepReport::is_success));
        assert!(report.step("after-2").is_some_and(StepReport::is_success));
    }

    #[test]
    fn test_parallel_sibling_failure_is_isolated() {
        let journal: Arc<Mutex<Vec<String>>> = Arc::default();
        let report = Flow::parallel([
            Probe::failing("broken", &journal),
            Probe::flow("fine", &journal),
        ])
        .plan()
        .run();

        assert_eq!(report.steps.len(), 2);
        assert!(report.step("fine").is_some_and(StepReport::is_success));
    }

    #[test]
    fn test_single_worker_pool() {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();

        let journal: Arc<Mutex<Vec<String>>> = Arc::default();
        let report = pool.install(|| {
            Flow::sequence([
                Flow::parallel([Probe::flow("clean-a", &journal), Probe::flow("clean-b", &journal)]),
                Flow::parallel([Probe::flow("build-a", &journal), Probe::flow("build-b", &journal)]),
                Probe::flow("after", &journal),
            ])
            .plan()
            .run()
        });

        assert!(report.is_success());
        assert_eq!(report.steps.len(), 5);

        let journal = journal.lock().unwrap();
        assert!(position(&journal, "end:build-b") < position(&journal, "start:after"));
        assert!(position(&journal, "end:clean-a") < position(&journal, "start:build-a"));
    }

    struct Panics;

    impl Task for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        fn run(&self) -> Result<(), TaskError> {
            panic!("boom")
        }
    }

    #[test]
    fn test_panic_becomes_failed_step() {
        let report = Flow::task(Panics).plan().run();

        let step = report.step("panics").unwrap();
        assert!(matches!(&step.error, Some(TaskError::Panic(msg)) if msg == "boom"));
    }

    #[test]
    fn test_empty_plan() {
        let report = Flow::sequence([]).plan().run();
        assert!(report.is_success());
        assert!(report.steps.is_empty());
    }
}
