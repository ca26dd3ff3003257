//! Read-only road graph consumed by the partitioner
//!
//! Nodes carry dense 0-based ids and coordinates. Edges are kept twice in CSR
//! form: grouped by tail (out-edges) and grouped by head (in-edges). The
//! partitioner never mutates the graph; flow networks are derived per call.

use std::ops::Range;

use crate::error::{PartitionError, Result};

/// Road network node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub id: u32,
    pub lat: f64,
    pub lon: f64,
}

impl Node {
    pub fn new(id: u32, lat: f64, lon: f64) -> Self {
        Self { id, lat, lon }
    }
}

/// Directed road segment. `directed == false` means the segment may be used
/// in both directions when building flow networks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub from: u32,
    pub to: u32,
    pub weight: f64,
    pub directed: bool,
}

impl Edge {
    pub fn new(from: u32, to: u32, weight: f64, directed: bool) -> Self {
        Self {
            from,
            to,
            weight,
            directed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoadGraph {
    nodes: Vec<Node>,
    first_out: Vec<u32>, // n_nodes + 1
    out_edges: Vec<Edge>,
    first_in: Vec<u32>, // n_nodes + 1
    in_edges: Vec<Edge>,
}

impl RoadGraph {
    /// Build the graph from ingestion output.
    ///
    /// Node ids must be dense and match their position; edge endpoints must
    /// reference existing nodes and weights must be finite and non-negative.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self> {
        let n = nodes.len();
        if n > u32::MAX as usize {
            return Err(PartitionError::InvalidGraph(format!(
                "{} nodes exceed the u32 id space",
                n
            )));
        }

        for (i, node) in nodes.iter().enumerate() {
            if node.id as usize != i {
                return Err(PartitionError::InvalidGraph(format!(
                    "node at position {} has id {} (ids must be dense and 0-based)",
                    i, node.id
                )));
            }
        }

        for (i, edge) in edges.iter().enumerate() {
            if edge.from as usize >= n || edge.to as usize >= n {
                return Err(PartitionError::InvalidGraph(format!(
                    "edge {} ({} -> {}) references a node outside 0..{}",
                    i, edge.from, edge.to, n
                )));
            }
            if !edge.weight.is_finite() || edge.weight < 0.0 {
                return Err(PartitionError::InvalidGraph(format!(
                    "edge {} ({} -> {}) has invalid weight {}",
                    i, edge.from, edge.to, edge.weight
                )));
            }
        }

        let (first_out, out_edges) = build_csr(n, &edges, |e| e.from);
        let (first_in, in_edges) = build_csr(n, &edges, |e| e.to);

        Ok(Self {
            nodes,
            first_out,
            out_edges,
            first_in,
            in_edges,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: u32) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.out_edges.len()
    }

    /// All node ids in id order
    pub fn node_ids(&self) -> Vec<u32> {
        (0..self.nodes.len() as u32).collect()
    }

    /// Indices (into the out-edge array) of the edges leaving `node`
    pub fn out_edge_ids(&self, node: u32) -> Range<usize> {
        self.first_out[node as usize] as usize..self.first_out[node as usize + 1] as usize
    }

    pub fn out_edge(&self, index: usize) -> &Edge {
        &self.out_edges[index]
    }

    pub fn out_edges(&self, node: u32) -> &[Edge] {
        &self.out_edges[self.out_edge_ids(node)]
    }

    /// Indices (into the in-edge array) of the edges entering `node`
    pub fn in_edge_ids(&self, node: u32) -> Range<usize> {
        self.first_in[node as usize] as usize..self.first_in[node as usize + 1] as usize
    }

    /// In-edges keep their original orientation: `edge.to == node`.
    pub fn in_edge(&self, index: usize) -> &Edge {
        &self.in_edges[index]
    }

    pub fn in_edges(&self, node: u32) -> &[Edge] {
        &self.in_edges[self.in_edge_ids(node)]
    }

    /// Every edge once, grouped by tail
    pub fn edges(&self) -> &[Edge] {
        &self.out_edges
    }
}

/// Counting-sort the edges into CSR order keyed by `key`
fn build_csr(n: usize, edges: &[Edge], key: impl Fn(&Edge) -> u32) -> (Vec<u32>, Vec<Edge>) {
    let mut offsets = vec![0u32; n + 1];
    for edge in edges {
        offsets[key(edge) as usize + 1] += 1;
    }
    for i in 0..n {
        offsets[i + 1] += offsets[i];
    }

    let mut cursor = offsets.clone();
    let mut sorted = vec![Edge::new(0, 0, 0.0, true); edges.len()];
    for edge in edges {
        let slot = &mut cursor[key(edge) as usize];
        sorted[*slot as usize] = *edge;
        *slot += 1;
    }

    (offsets, sorted)
}
