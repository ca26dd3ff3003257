//! Max-flow / min-cut over ephemeral flow networks
//!
//! A [`FlowNetwork`] is built fresh for every bisection call and dropped once
//! its cut is extracted. Edges are stored in an arena; every edge records the
//! index of its paired reverse edge, so residual updates never depend on
//! insertion parity.
//!
//! Two solvers share the network: [`Dinic`] (default) and [`EdmondsKarp`].

mod dinic;
mod edmonds_karp;

pub use dinic::Dinic;
pub use edmonds_karp::EdmondsKarp;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowEdge {
    pub from: u32,
    pub to: u32,
    /// Arena index of the paired reverse edge
    pub rev: u32,
    pub capacity: f64,
    pub flow: f64,
}

impl FlowEdge {
    #[inline]
    pub fn residual(&self) -> f64 {
        self.capacity - self.flow
    }
}

#[derive(Debug, Clone)]
pub struct FlowNetwork {
    edges: Vec<FlowEdge>,
    adjacency: Vec<Vec<u32>>,
}

/// Result of [`FlowNetwork::min_cut`]
#[derive(Debug, Clone, Default)]
pub struct MinCut {
    /// Residual-reachable vertices, terminals excluded
    pub source_side: Vec<u32>,
    /// Remaining vertices, terminals excluded
    pub sink_side: Vec<u32>,
    /// Saturated edges from the source side to the sink side, as (from, to, capacity)
    pub cut_edges: Vec<(u32, u32, f64)>,
}

impl MinCut {
    pub fn capacity(&self) -> f64 {
        self.cut_edges.iter().map(|&(_, _, c)| c).sum()
    }
}

impl FlowNetwork {
    pub fn new(n_vertices: usize) -> Self {
        Self {
            edges: Vec::new(),
            adjacency: vec![Vec::new(); n_vertices],
        }
    }

    pub fn with_edge_capacity(n_vertices: usize, n_edges: usize) -> Self {
        Self {
            edges: Vec::with_capacity(2 * n_edges),
            adjacency: vec![Vec::new(); n_vertices],
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of stored edges, reverse edges included
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge(&self, index: usize) -> &FlowEdge {
        &self.edges[index]
    }

    pub fn adjacent(&self, u: u32) -> &[u32] {
        &self.adjacency[u as usize]
    }

    /// Insert `u -> v` plus its reverse edge.
    ///
    /// An undirected edge gets a reverse edge of equal capacity; a directed one
    /// gets a zero-capacity reverse edge used only for residual bookkeeping.
    /// Self-loops are dropped and return `None`.
    pub fn add_edge(&mut self, u: u32, v: u32, capacity: f64, directed: bool) -> Option<u32> {
        if u == v {
            return None;
        }
        let forward = self.edges.len() as u32;
        let backward = forward + 1;
        let reverse_capacity = if directed { 0.0 } else { capacity };

        self.edges.push(FlowEdge {
            from: u,
            to: v,
            rev: backward,
            capacity,
            flow: 0.0,
        });
        self.edges.push(FlowEdge {
            from: v,
            to: u,
            rev: forward,
            capacity: reverse_capacity,
            flow: 0.0,
        });
        self.adjacency[u as usize].push(forward);
        self.adjacency[v as usize].push(backward);

        Some(forward)
    }

    /// Push `amount` along edge `e` and mirror it on the reverse edge.
    ///
    /// A push that uses up the whole residual sets the flow to exactly the
    /// capacity, so saturation can be tested with exact comparisons.
    pub(crate) fn push(&mut self, e: u32, amount: f64) {
        let edge = &mut self.edges[e as usize];
        let flow = if amount >= edge.residual() {
            edge.capacity
        } else {
            edge.flow + amount
        };
        edge.flow = flow;
        let rev = edge.rev as usize;
        self.edges[rev].flow = -flow;
    }

    /// Reset all flows to zero, keeping the topology
    pub fn clear_flow(&mut self) {
        for edge in &mut self.edges {
            edge.flow = 0.0;
        }
    }

    /// Vertices reachable from `source` over edges with positive residual capacity
    pub fn residual_reachable(&self, source: u32) -> Vec<bool> {
        let mut reached = vec![false; self.vertex_count()];
        let mut queue = VecDeque::new();
        reached[source as usize] = true;
        queue.push_back(source);

        while let Some(u) = queue.pop_front() {
            for &e in &self.adjacency[u as usize] {
                let edge = &self.edges[e as usize];
                if edge.residual() > 0.0 && !reached[edge.to as usize] {
                    reached[edge.to as usize] = true;
                    queue.push_back(edge.to);
                }
            }
        }

        reached
    }

    /// Extract the minimum cut after a max-flow computation.
    pub fn min_cut(&self, source: u32, sink: u32) -> MinCut {
        let reached = self.residual_reachable(source);
        let mut cut = MinCut::default();

        for v in 0..self.vertex_count() as u32 {
            if v == source || v == sink {
                continue;
            }
            if reached[v as usize] {
                cut.source_side.push(v);
            } else {
                cut.sink_side.push(v);
            }
        }

        for edge in &self.edges {
            if reached[edge.from as usize]
                && !reached[edge.to as usize]
                && edge.capacity > 0.0
                && edge.residual() <= 0.0
            {
                cut.cut_edges.push((edge.from, edge.to, edge.capacity));
            }
        }

        cut
    }

    /// Compute the maximum flow with the given algorithm
    pub fn max_flow(&mut self, source: u32, sink: u32, algorithm: FlowAlgorithm) -> f64 {
        match algorithm {
            FlowAlgorithm::Dinic => Dinic.max_flow(self, source, sink),
            FlowAlgorithm::EdmondsKarp => EdmondsKarp.max_flow(self, source, sink),
        }
    }
}

/// Max-flow algorithm over a [`FlowNetwork`]
pub trait MaxFlowSolver {
    /// Saturate the network from `source` to `sink` and return the flow value.
    /// Flows accumulate on top of whatever the network already carries.
    fn max_flow(&self, network: &mut FlowNetwork, source: u32, sink: u32) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowAlgorithm {
    #[default]
    Dinic,
    EdmondsKarp,
}

impl std::str::FromStr for FlowAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dinic" => Ok(FlowAlgorithm::Dinic),
            "edmonds-karp" => Ok(FlowAlgorithm::EdmondsKarp),
            other => Err(format!(
                "unknown flow algorithm '{}' (expected dinic or edmonds-karp)",
                other
            )),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Terminal edge capacity, far above any fixture cut
    pub const INFINITE_CAPACITY: f64 = 1e18;

    /// 4-vertex diamond with a cross edge, source 0, sink 3, max flow 16
    pub fn diamond() -> FlowNetwork {
        let mut net = FlowNetwork::new(4);
        net.add_edge(0, 1, 8.0, true);
        net.add_edge(0, 2, 8.0, true);
        net.add_edge(1, 2, 1.0, true);
        net.add_edge(1, 3, 8.0, true);
        net.add_edge(2, 3, 8.0, true);
        net
    }

    fn add_classic_edges(net: &mut FlowNetwork) {
        net.add_edge(0, 1, 7.0, true);
        net.add_edge(0, 4, 4.0, true);
        net.add_edge(1, 2, 5.0, true);
        net.add_edge(1, 3, 3.0, true);
        net.add_edge(2, 5, 8.0, true);
        net.add_edge(3, 5, 5.0, true);
        net.add_edge(3, 2, 3.0, true);
        net.add_edge(4, 3, 2.0, true);
        net.add_edge(4, 1, 3.0, true);
    }

    /// Classic 6-vertex network, source 0, sink 5, max flow 10
    pub fn classic() -> FlowNetwork {
        let mut net = FlowNetwork::new(6);
        add_classic_edges(&mut net);
        net
    }

    /// Classic network plus vertices 6 (6 -> 1) and 7 (2 -> 7), super-source 8
    /// feeding {6, 0} and super-sink 9 fed by {7, 5}
    pub fn multi_terminal() -> FlowNetwork {
        let mut net = FlowNetwork::new(10);
        add_classic_edges(&mut net);
        net.add_edge(6, 1, 2.0, true);
        net.add_edge(2, 7, 2.0, true);
        net.add_edge(8, 6, INFINITE_CAPACITY, true);
        net.add_edge(8, 0, INFINITE_CAPACITY, true);
        net.add_edge(7, 9, INFINITE_CAPACITY, true);
        net.add_edge(5, 9, INFINITE_CAPACITY, true);
        net
    }
}
