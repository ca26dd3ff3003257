//! Inertial flow recursive bisection
//!
//! Each split projects the cell's coordinates onto a line, ties the first
//! quarter of the order to a super-source and the last quarter to a
//! super-sink, and cuts along a minimum edge cut between them. Splits
//! repeat until every cell fits the region size.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::config::InertialFlowParams;
use crate::flow::FlowNetwork;
use crate::graph::RoadGraph;

/// Fixed projection directions as (x, y) = (lon, lat) weights
const FIXED_LINES: [(f64, f64); 4] = [(1.0, 0.0), (0.0, 1.0), (1.0, 1.0), (-1.0, 1.0)];

/// Cells at least this large with a zero-weight cut get a warning
const ZERO_CUT_WARN_SIZE: usize = 1_000;

/// An original graph edge separating two cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CutEdge {
    pub from: u32,
    pub to: u32,
}

/// One split of a node set
#[derive(Debug, Clone, Default)]
pub struct Bisection {
    pub source_side: Vec<u32>,
    pub sink_side: Vec<u32>,
    pub cut_edges: Vec<CutEdge>,
    pub cut_weight: f64,
}

/// Leaf cells and every edge cut on the way down
#[derive(Debug, Clone, Default)]
pub struct BisectionResult {
    pub cells: Vec<Vec<u32>>,
    pub cut_edges: Vec<CutEdge>,
    pub cut_weight: f64,
}

impl BisectionResult {
    fn leaf(nodes: Vec<u32>) -> Self {
        Self {
            cells: vec![nodes],
            ..Self::default()
        }
    }

    fn merge(&mut self, other: BisectionResult) {
        self.cells.extend(other.cells);
        self.cut_edges.extend(other.cut_edges);
        self.cut_weight += other.cut_weight;
    }
}

pub struct InertialFlow<'a> {
    graph: &'a RoadGraph,
    params: InertialFlowParams,
}

impl<'a> InertialFlow<'a> {
    pub fn new(graph: &'a RoadGraph, params: InertialFlowParams) -> Self {
        Self { graph, params }
    }

    /// Recursively bisect `nodes` until every cell has at most `region_size`
    /// nodes (or sits at the `min_cell_size` floor).
    ///
    /// `key` separates the random streams of independent calls on the same
    /// seed; calls with equal seed, key and input produce equal cells.
    pub fn partition(&self, nodes: &[u32], region_size: usize, key: u64) -> BisectionResult {
        self.split_all(nodes.to_vec(), region_size, key)
    }

    /// Partition the whole graph at one region size
    pub fn partition_graph(&self, region_size: usize) -> BisectionResult {
        self.partition(&self.graph.node_ids(), region_size, 1)
    }

    fn is_leaf(&self, len: usize, region_size: usize) -> bool {
        len <= region_size || len <= self.params.min_cell_size
    }

    /// Worklist driver. Small subtrees are processed in place; when both halves
    /// of a split are large they are handed to `rayon::join`.
    fn split_all(&self, nodes: Vec<u32>, region_size: usize, key: u64) -> BisectionResult {
        let mut result = BisectionResult::default();
        let mut pending = vec![(nodes, key)];

        while let Some((nodes, key)) = pending.pop() {
            if self.is_leaf(nodes.len(), region_size) {
                result.merge(BisectionResult::leaf(nodes));
                continue;
            }

            let mut rng = self.rng_for(key);
            let split = self.bisect_once(&nodes, &mut rng);
            if split.source_side.is_empty() || split.sink_side.is_empty() {
                warn!(nodes = nodes.len(), "bisection made no progress, keeping cell whole");
                result.merge(BisectionResult::leaf(nodes));
                continue;
            }
            drop(nodes);

            result.cut_edges.extend(split.cut_edges);
            result.cut_weight += split.cut_weight;

            let key_a = child_key(key, 0);
            let key_b = child_key(key, 1);
            let threshold = self.params.parallel_threshold;

            if split.source_side.len() >= threshold && split.sink_side.len() >= threshold {
                let (a, b) = rayon::join(
                    || self.split_all(split.source_side, region_size, key_a),
                    || self.split_all(split.sink_side, region_size, key_b),
                );
                result.merge(a);
                result.merge(b);
            } else {
                pending.push((split.sink_side, key_b));
                pending.push((split.source_side, key_a));
            }
        }

        result
    }

    fn rng_for(&self, key: u64) -> StdRng {
        match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(splitmix64(seed ^ splitmix64(key))),
            None => StdRng::from_os_rng(),
        }
    }

    /// Projection direction: one of the fixed lines or a random angle,
    /// all candidates equally likely.
    fn pick_line(&self, rng: &mut StdRng) -> (f64, f64) {
        let candidates = FIXED_LINES.len() + self.params.random_lines;
        let choice = rng.random_range(0..candidates);
        if choice < FIXED_LINES.len() {
            FIXED_LINES[choice]
        } else {
            let angle = rng.random_range(0.0..PI);
            (angle.cos(), angle.sin())
        }
    }

    /// Split `nodes` once along a minimum cut.
    ///
    /// Both sides are non-empty whenever `nodes` has at least two entries:
    /// terminal edges outweigh all internal edges together, so source
    /// candidates stay reachable and sink candidates never are.
    pub fn bisect_once(&self, nodes: &[u32], rng: &mut StdRng) -> Bisection {
        let n = nodes.len();
        if n < 2 {
            return Bisection {
                source_side: nodes.to_vec(),
                ..Bisection::default()
            };
        }

        let line = self.pick_line(rng);
        let mut order: Vec<(f64, u32)> = nodes
            .iter()
            .map(|&id| {
                let node = self.graph.node(id);
                (node.lon * line.0 + node.lat * line.1, id)
            })
            .collect();
        order.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let k = ((self.params.source_sink_fraction * n as f64).floor() as usize).clamp(1, n / 2);

        let local: FxHashMap<u32, u32> = order
            .iter()
            .enumerate()
            .map(|(i, &(_, id))| (id, i as u32))
            .collect();

        // local ids follow the projected order; n and n + 1 are the terminals
        let source = n as u32;
        let sink = n as u32 + 1;
        let mut internal = Vec::new();
        let mut internal_weight = 0.0;
        for (u_local, &(_, u)) in order.iter().enumerate() {
            for edge in self.graph.out_edges(u) {
                if let Some(&v_local) = local.get(&edge.to) {
                    internal.push((u_local as u32, v_local, edge.weight, edge.directed));
                    internal_weight += edge.weight;
                }
            }
        }

        // strictly above every cut made of real edges, so terminal edges never saturate
        let terminal_capacity = 2.0 * internal_weight + 1.0;
        let mut network = FlowNetwork::with_edge_capacity(n + 2, internal.len() + 2 * k);
        for &(u, v, weight, directed) in &internal {
            network.add_edge(u, v, weight, directed);
        }
        for i in 0..k {
            network.add_edge(source, i as u32, terminal_capacity, true);
            network.add_edge((n - 1 - i) as u32, sink, terminal_capacity, true);
        }

        let flow = network.max_flow(source, sink, self.params.flow_algorithm);
        let cut = network.min_cut(source, sink);

        let to_original = |local_id: u32| order[local_id as usize].1;
        let source_side: Vec<u32> = cut.source_side.iter().map(|&v| to_original(v)).collect();
        let sink_side: Vec<u32> = cut.sink_side.iter().map(|&v| to_original(v)).collect();
        let cut_edges: Vec<CutEdge> = cut
            .cut_edges
            .iter()
            .filter(|&&(u, v, _)| u < source && v < source)
            .map(|&(u, v, _)| CutEdge {
                from: to_original(u),
                to: to_original(v),
            })
            .collect();

        debug!(
            nodes = n,
            terminals = k,
            line_x = line.0,
            line_y = line.1,
            flow,
            source_side = source_side.len(),
            sink_side = sink_side.len(),
            cut_edges = cut_edges.len(),
            "bisected cell"
        );
        if flow == 0.0 && n >= ZERO_CUT_WARN_SIZE {
            warn!(nodes = n, "zero-weight cut, cell is disconnected between its terminals");
        }

        Bisection {
            source_side,
            sink_side,
            cut_edges,
            cut_weight: flow,
        }
    }
}

/// Derive the random key of one half from its parent's key
fn child_key(key: u64, side: u64) -> u64 {
    splitmix64(key.wrapping_mul(2).wrapping_add(side))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

#[cfg(test)]
pub(crate) mod test_graphs {
    use crate::graph::{Edge, Node, RoadGraph};

    /// `width x height` grid of undirected unit-weight edges, 0.01° spacing
    pub fn grid(width: u32, height: u32) -> RoadGraph {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let id = y * width + x;
                nodes.push(Node::new(id, 50.0 + y as f64 * 0.01, 4.0 + x as f64 * 0.01));
                if x + 1 < width {
                    edges.push(Edge::new(id, id + 1, 1.0, false));
                }
                if y + 1 < height {
                    edges.push(Edge::new(id, id + width, 1.0, false));
                }
            }
        }
        RoadGraph::new(nodes, edges).unwrap()
    }
}
