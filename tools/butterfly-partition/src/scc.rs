//! Strongly connected components (Tarjan)
//!
//! One DFS pass over the directed road graph. One-way dead ends and isolated
//! ramps show up as small components; the multilevel partitioner emits those
//! as whole cells instead of handing them to the bisector.

use tracing::info;

use crate::graph::RoadGraph;

const UNVISITED: u32 = u32::MAX;

/// SCCs of a graph
#[derive(Debug, Clone)]
pub struct SccDecomposition {
    /// Components, largest first (ties broken by smallest node id)
    pub components: Vec<Vec<u32>>,
    /// Node id → index into `components`
    pub component_of: Vec<u32>,
}

impl SccDecomposition {
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Split the components at `threshold`: (atomic `<= threshold`, bisectable `> threshold`)
    pub fn split_by_size(&self, threshold: usize) -> (Vec<&[u32]>, Vec<&[u32]>) {
        let mut small = Vec::new();
        let mut large = Vec::new();
        for component in &self.components {
            if component.len() <= threshold {
                small.push(component.as_slice());
            } else {
                large.push(component.as_slice());
            }
        }
        (small, large)
    }
}

struct Frame {
    node: u32,
    /// Position in the out-edges of `node`, continued into its in-edges
    edge_pos: usize,
}

/// Next successor of `u` at or after `pos`, with the position to resume from.
/// Undirected edges are stored once, so their tails are also successors of
/// their heads.
fn successor(graph: &RoadGraph, u: u32, pos: usize) -> Option<(u32, usize)> {
    let out = graph.out_edges(u);
    if pos < out.len() {
        return Some((out[pos].to, pos + 1));
    }
    let skip = pos - out.len();
    graph.in_edges(u)[skip..]
        .iter()
        .position(|e| !e.directed)
        .map(|i| (graph.in_edges(u)[skip + i].from, pos + i + 1))
}

/// Find all strongly connected components.
///
/// The DFS is driven by an explicit call stack so that continent-sized graphs
/// do not overflow the thread stack.
pub fn decompose(graph: &RoadGraph) -> SccDecomposition {
    let n = graph.node_count();
    let mut index = vec![UNVISITED; n];
    let mut low = vec![0u32; n];
    let mut on_stack = vec![false; n];
    let mut open: Vec<u32> = Vec::new();
    let mut calls: Vec<Frame> = Vec::new();
    let mut counter = 0u32;
    let mut components: Vec<Vec<u32>> = Vec::new();

    for root in 0..n as u32 {
        if index[root as usize] != UNVISITED {
            continue;
        }

        index[root as usize] = counter;
        low[root as usize] = counter;
        counter += 1;
        open.push(root);
        on_stack[root as usize] = true;
        calls.push(Frame {
            node: root,
            edge_pos: 0,
        });

        while let Some(frame) = calls.last_mut() {
            let u = frame.node;

            if let Some((v, next_pos)) = successor(graph, u, frame.edge_pos) {
                frame.edge_pos = next_pos;

                if index[v as usize] == UNVISITED {
                    index[v as usize] = counter;
                    low[v as usize] = counter;
                    counter += 1;
                    open.push(v);
                    on_stack[v as usize] = true;
                    calls.push(Frame {
                        node: v,
                        edge_pos: 0,
                    });
                } else if on_stack[v as usize] {
                    low[u as usize] = low[u as usize].min(low[v as usize]);
                }
                continue;
            }

            // all out-edges of u explored
            calls.pop();

            if low[u as usize] == index[u as usize] {
                let mut component = Vec::new();
                while let Some(w) = open.pop() {
                    on_stack[w as usize] = false;
                    component.push(w);
                    if w == u {
                        break;
                    }
                }
                components.push(component);
            }

            if let Some(parent) = calls.last() {
                let p = parent.node as usize;
                if on_stack[u as usize] {
                    low[p] = low[p].min(low[u as usize]);
                }
            }
        }
    }

    for component in &mut components {
        component.sort_unstable();
    }
    // sort by size descending, then by min node id for determinism
    components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));

    let mut component_of = vec![0u32; n];
    for (i, component) in components.iter().enumerate() {
        for &node in component {
            component_of[node as usize] = i as u32;
        }
    }

    info!(
        components = components.len(),
        largest = components.first().map_or(0, |c| c.len()),
        "found strongly connected components"
    );

    SccDecomposition {
        components,
        component_of,
    }
}
