//! Workloads for tests and benchmarks: a graph, a batch of initial edges and one list of
//! operations per thread.

use std::collections::HashSet;

use rand::{rngs, Rng, SeedableRng};

use crate::dynamic_connectivity::{DynamicConnectivity, Variant};
use crate::edge::Edge;

/// Source of the graph a scenario is built on.
pub trait GraphProvider {
    fn nodes(&self) -> usize;
    fn edges(&self) -> Vec<(usize, usize)>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    pub nodes: usize,
    pub edges: Vec<(usize, usize)>,
}

impl Graph {
    /// Simple graph with `m` distinct edges chosen uniformly, in random order. `m` is capped at
    /// the number of vertex pairs.
    pub fn random(n: usize, m: usize, seed: u64) -> Self {
        let mut rng = rngs::StdRng::seed_from_u64(seed);
        let m = m.min(n * n.saturating_sub(1) / 2);
        let mut seen = HashSet::with_capacity(m);
        let mut edges = Vec::with_capacity(m);
        while edges.len() < m {
            let (u, v) = (rng.gen_range(0..n), rng.gen_range(0..n));
            if u != v && seen.insert(Edge::new(u, v)) {
                edges.push((u, v));
            }
        }
        Self { nodes: n, edges }
    }
}

impl GraphProvider for Graph {
    fn nodes(&self) -> usize {
        self.nodes
    }
    fn edges(&self) -> Vec<(usize, usize)> {
        self.edges.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AddEdge(usize, usize),
    RemoveEdge(usize, usize),
    Connected(usize, usize),
}

impl Operation {
    /// Runs the operation, returning what it observed if it is a query.
    pub fn apply<D: DynamicConnectivity + ?Sized>(self, dc: &D) -> Option<bool> {
        match self {
            Operation::AddEdge(u, v) => dc.add_edge(u, v),
            Operation::RemoveEdge(u, v) => dc.remove_edge(u, v),
            Operation::Connected(u, v) => return Some(dc.connected(u, v)),
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub nodes: usize,
    pub initial_edges: Vec<(usize, usize)>,
    /// One list per thread.
    pub queries: Vec<Vec<Operation>>,
}

impl Scenario {
    pub fn threads(&self) -> usize {
        self.queries.len()
    }
}

pub struct ScenarioGenerator;

impl ScenarioGenerator {
    /// Splits the graph's edges in two halves: the first is added before the threads start, the
    /// second holds candidates to add. Both are partitioned between the threads, and every thread
    /// only adds and removes its own edges, so no edge is changed by two threads.
    ///
    /// Each operation is a query with weight `read_weight`, or an update with weight
    /// `update_weight`, equally likely an add or a remove.
    pub fn generate(
        graph: &impl GraphProvider,
        threads: usize,
        size_per_thread: usize,
        update_weight: u32,
        read_weight: u32,
        seed: u64,
    ) -> Scenario {
        assert!(threads > 0, "a scenario needs a thread");
        assert!(update_weight + read_weight > 0, "all weights are zero");
        let mut rng = rngs::StdRng::seed_from_u64(seed);
        let nodes = graph.nodes();
        let edges = graph.edges();
        let initial = edges.len() / 2;
        let initial_per_thread = initial / threads;
        let other_per_thread = (edges.len() - initial) / threads;

        let queries = (0..threads)
            .map(|t| {
                let mut to_remove =
                    edges[t * initial_per_thread..(t + 1) * initial_per_thread].to_vec();
                let start = initial + t * other_per_thread;
                let mut to_add = edges[start..start + other_per_thread].to_vec();
                (0..size_per_thread)
                    .map(|_| {
                        let read = rng.gen_range(0..update_weight + read_weight) < read_weight;
                        let add = rng.gen_bool(0.5);
                        let (from, to, op): (_, _, fn(usize, usize) -> Operation) =
                            if add || to_remove.is_empty() {
                                (&mut to_add, &mut to_remove, Operation::AddEdge)
                            } else {
                                (&mut to_remove, &mut to_add, Operation::RemoveEdge)
                            };
                        if read || nodes < 2 || from.is_empty() {
                            return Self::random_pair(&mut rng, nodes);
                        }
                        let e = from.swap_remove(rng.gen_range(0..from.len()));
                        to.push(e);
                        op(e.0, e.1)
                    })
                    .collect()
            })
            .collect();
        Scenario {
            nodes,
            initial_edges: edges[..initial].to_vec(),
            queries,
        }
    }

    fn random_pair(rng: &mut impl Rng, nodes: usize) -> Operation {
        if nodes < 2 {
            return Operation::Connected(0, 0);
        }
        loop {
            let (u, v) = (rng.gen_range(0..nodes), rng.gen_range(0..nodes));
            if u != v {
                return Operation::Connected(u, v);
            }
        }
    }
}

/// Receives the operations of a sequential run with what each query returned.
pub trait ResultSink {
    fn record(&mut self, op: &Operation, observed: Option<bool>);
}

pub struct ScenarioExecutor;

impl ScenarioExecutor {
    /// Builds the variant, adds the initial edges and runs each thread's operations on its own
    /// thread. Returns the instance for inspection.
    pub fn run(scenario: &Scenario, variant: Variant) -> Box<dyn DynamicConnectivity> {
        let dc = variant.build(scenario.nodes);
        Self::run_on(scenario, &*dc);
        dc
    }

    /// Like [`ScenarioExecutor::run`], on an existing instance.
    pub fn run_on<D: DynamicConnectivity + ?Sized>(scenario: &Scenario, dc: &D) {
        for &(u, v) in &scenario.initial_edges {
            dc.add_edge(u, v);
        }
        log::debug!(
            "running {} threads on {} vertices",
            scenario.threads(),
            scenario.nodes
        );
        std::thread::scope(|s| {
            for queries in &scenario.queries {
                s.spawn(move || {
                    for &op in queries {
                        op.apply(dc);
                    }
                });
            }
        });
    }

    /// Runs every thread's operations one after the other on the calling thread, reporting each
    /// one to `sink`.
    pub fn run_with_sink(
        scenario: &Scenario,
        variant: Variant,
        sink: &mut impl ResultSink,
    ) -> Box<dyn DynamicConnectivity> {
        let dc = variant.build(scenario.nodes);
        for &(u, v) in &scenario.initial_edges {
            let op = Operation::AddEdge(u, v);
            sink.record(&op, op.apply(&*dc));
        }
        for op in scenario.queries.iter().flatten() {
            sink.record(op, op.apply(&*dc));
        }
        dc
    }
}
