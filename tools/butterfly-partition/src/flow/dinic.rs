//! Dinic's blocking-flow algorithm

use std::collections::VecDeque;

use super::{FlowNetwork, MaxFlowSolver};

const UNREACHED: u32 = u32::MAX;

/// Dinic max-flow: BFS level graph, then augmenting paths strictly along
/// layered edges until the phase is blocked.
///
/// Augmentation is iterative (explicit path stack) so deep level graphs on
/// large cells cannot overflow worker-thread stacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dinic;

impl MaxFlowSolver for Dinic {
    fn max_flow(&self, network: &mut FlowNetwork, source: u32, sink: u32) -> f64 {
        if source == sink {
            return 0.0;
        }

        let n = network.vertex_count();
        let mut level = vec![UNREACHED; n];
        let mut next = vec![0usize; n];
        let mut path: Vec<u32> = Vec::new();
        let mut total = 0.0;

        while build_levels(network, source, sink, &mut level) {
            next.fill(0);
            loop {
                let pushed = augment(network, source, sink, &level, &mut next, &mut path);
                if pushed <= 0.0 {
                    break;
                }
                total += pushed;
            }
        }

        total
    }
}

/// BFS from `source` over positive-residual edges. Returns whether `sink` was reached.
fn build_levels(network: &FlowNetwork, source: u32, sink: u32, level: &mut [u32]) -> bool {
    level.fill(UNREACHED);
    level[source as usize] = 0;

    let mut queue = VecDeque::new();
    queue.push_back(source);

    while let Some(u) = queue.pop_front() {
        for &e in network.adjacent(u) {
            let edge = network.edge(e as usize);
            if edge.residual() > 0.0 && level[edge.to as usize] == UNREACHED {
                level[edge.to as usize] = level[u as usize] + 1;
                queue.push_back(edge.to);
            }
        }
    }

    level[sink as usize] != UNREACHED
}

/// Find one source-sink path in the level graph and push its bottleneck.
///
/// `next[u]` is the resume pointer into `u`'s adjacency: edges before it are
/// saturated or lead to dead ends for the rest of this phase.
fn augment(
    network: &mut FlowNetwork,
    source: u32,
    sink: u32,
    level: &[u32],
    next: &mut [usize],
    path: &mut Vec<u32>,
) -> f64 {
    path.clear();
    let mut u = source;

    loop {
        if u == sink {
            let bottleneck = path
                .iter()
                .map(|&e| network.edge(e as usize).residual())
                .fold(f64::INFINITY, f64::min);
            for &e in path.iter() {
                network.push(e, bottleneck);
            }
            return bottleneck;
        }

        let mut advanced = false;
        {
            let adjacency = network.adjacent(u);
            while next[u as usize] < adjacency.len() {
                let e = adjacency[next[u as usize]];
                let edge = network.edge(e as usize);
                if edge.residual() > 0.0 && level[edge.to as usize] == level[u as usize] + 1 {
                    path.push(e);
                    u = edge.to;
                    advanced = true;
                    break;
                }
                next[u as usize] += 1;
            }
        }

        if !advanced {
            // dead end: retreat one edge and skip it from now on
            match path.pop() {
                None => return 0.0,
                Some(e) => {
                    u = network.edge(e as usize).from;
                    next[u as usize] += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    #[test]
    fn test_diamond() {
        let mut net = diamond();
        assert_eq!(Dinic.max_flow(&mut net, 0, 3), 16.0);
    }

    #[test]
    fn test_classic() {
        let mut net = classic();
        assert_eq!(Dinic.max_flow(&mut net, 0, 5), 10.0);
    }

    #[test]
    fn test_disconnected_sink() {
        let mut net = FlowNetwork::new(4);
        net.add_edge(0, 1, 5.0, true);
        net.add_edge(2, 3, 5.0, true);
        assert_eq!(Dinic.max_flow(&mut net, 0, 3), 0.0);
    }

    #[test]
    fn test_long_chain_is_iterative() {
        // a path much deeper than any recursion would comfortably allow on a 2 MiB stack
        let n = 200_000u32;
        let mut net = FlowNetwork::new(n as usize);
        for v in 0..n - 1 {
            let capacity = if v == n / 2 { 1.5 } else { 7.0 };
            net.add_edge(v, v + 1, capacity, false);
        }
        assert_eq!(Dinic.max_flow(&mut net, 0, n - 1), 1.5);
    }

    #[test]
    fn test_parallel_terminal_edges() {
        // duplicated terminal edges must not change the value
        let mut net = FlowNetwork::new(4);
        net.add_edge(0, 1, INFINITE_CAPACITY, true);
        net.add_edge(0, 1, INFINITE_CAPACITY, true);
        net.add_edge(1, 2, 3.0, false);
        net.add_edge(2, 3, INFINITE_CAPACITY, true);
        assert_eq!(Dinic.max_flow(&mut net, 0, 3), 3.0);
    }
}
