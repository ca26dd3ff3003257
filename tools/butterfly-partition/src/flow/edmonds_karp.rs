//! Edmonds–Karp: shortest augmenting paths found by BFS

use std::collections::VecDeque;

use super::{FlowNetwork, MaxFlowSolver};

const NO_EDGE: u32 = u32::MAX;

/// Simpler and slower than [`super::Dinic`]; kept as a selectable solver and
/// as a cross-check for Dinic in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdmondsKarp;

impl MaxFlowSolver for EdmondsKarp {
    fn max_flow(&self, network: &mut FlowNetwork, source: u32, sink: u32) -> f64 {
        if source == sink {
            return 0.0;
        }

        let n = network.vertex_count();
        let mut parent_edge = vec![NO_EDGE; n];
        let mut visited = vec![false; n];
        let mut queue = VecDeque::new();
        let mut total = 0.0;

        loop {
            parent_edge.fill(NO_EDGE);
            visited.fill(false);
            queue.clear();
            visited[source as usize] = true;
            queue.push_back(source);

            while let Some(u) = queue.pop_front() {
                if u == sink {
                    break;
                }
                for &e in network.adjacent(u) {
                    let edge = network.edge(e as usize);
                    if !visited[edge.to as usize] && edge.residual() > 0.0 {
                        visited[edge.to as usize] = true;
                        parent_edge[edge.to as usize] = e;
                        queue.push_back(edge.to);
                    }
                }
            }

            if !visited[sink as usize] {
                break;
            }

            let mut bottleneck = f64::INFINITY;
            let mut v = sink;
            while v != source {
                let edge = network.edge(parent_edge[v as usize] as usize);
                bottleneck = bottleneck.min(edge.residual());
                v = edge.from;
            }

            let mut v = sink;
            while v != source {
                let e = parent_edge[v as usize];
                v = network.edge(e as usize).from;
                network.push(e, bottleneck);
            }

            total += bottleneck;
        }

        total
    }
}
