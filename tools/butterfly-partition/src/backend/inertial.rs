use super::{CellPartitioner, CellRequest};
use crate::config::InertialFlowParams;
use crate::error::Result;
use crate::graph::RoadGraph;
use crate::inertial_flow::InertialFlow;

/// Built-in backend: recursive inertial flow bisection
#[derive(Debug, Clone)]
pub struct InertialFlowBackend {
    params: InertialFlowParams,
}

impl InertialFlowBackend {
    pub fn new(params: InertialFlowParams) -> Self {
        Self { params }
    }
}

/// Random stream key of one cell, distinct across levels and cells
fn cell_key(level: usize, cell_id: usize) -> u64 {
    ((level as u64 + 1) << 48) ^ cell_id as u64
}

impl CellPartitioner for InertialFlowBackend {
    fn name(&self) -> &'static str {
        "inertial-flow"
    }

    fn partition_cell(&self, graph: &RoadGraph, request: &CellRequest<'_>) -> Result<Vec<Vec<u32>>> {
        let bisector = InertialFlow::new(graph, self.params.clone());
        let result = bisector.partition(
            request.nodes,
            request.max_cell_size,
            cell_key(request.level, request.cell_id),
        );
        Ok(result.cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inertial_flow::test_graphs::grid;

    #[test]
    fn test_splits_only_the_requested_nodes() {
        let g = grid(10, 10);
        let backend = InertialFlowBackend::new(InertialFlowParams {
            seed: Some(1),
            ..InertialFlowParams::default()
        });
        // left half of the grid
        let nodes: Vec<u32> = (0..100).filter(|v| v % 10 < 5).collect();
        let request = CellRequest {
            level: 1,
            cell_id: 0,
            nodes: &nodes,
            max_cell_size: 12,
        };
        let cells = backend.partition_cell(&g, &request).unwrap();

        let mut covered: Vec<u32> = cells.iter().flatten().copied().collect();
        covered.sort_unstable();
        assert_eq!(covered, nodes);
        assert!(cells.iter().all(|c| c.len() <= 12));
    }

    #[test]
    fn test_cell_keys_are_distinct() {
        assert_ne!(cell_key(0, 1), cell_key(1, 1));
        assert_ne!(cell_key(0, 1), cell_key(0, 2));
    }
}
