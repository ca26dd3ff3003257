//! Multilevel partitioning
//!
//! The coarsest level is cut from the whole graph (optionally after splitting
//! it into strongly connected components). Every finer level re-partitions
//! each cell of the level above on its own, so cells nest strictly.

use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use crate::backend::{self, CellPartitioner, CellRequest};
use crate::config::PartitionConfig;
use crate::error::Result;
use crate::graph::RoadGraph;
use crate::hierarchy::{CellHierarchy, LevelCells};
use crate::scc;

pub struct MultilevelPartitioner<'a> {
    graph: &'a RoadGraph,
    config: PartitionConfig,
    backend: Box<dyn CellPartitioner>,
}

impl<'a> MultilevelPartitioner<'a> {
    /// Validate `config` and set up the backend it selects
    pub fn new(graph: &'a RoadGraph, config: PartitionConfig) -> Result<Self> {
        config.validate()?;
        let backend = backend::from_config(&config)?;
        Ok(Self {
            graph,
            config,
            backend,
        })
    }

    pub fn with_backend(
        graph: &'a RoadGraph,
        config: PartitionConfig,
        backend: Box<dyn CellPartitioner>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            graph,
            config,
            backend,
        })
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Partition every level and encode the hierarchy.
    ///
    /// With `threads` set the work runs on a dedicated pool of that size,
    /// otherwise on rayon's global pool.
    pub fn run(&self) -> Result<CellHierarchy> {
        match self.config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("partition-{}", i))
                    .build()?;
                pool.install(|| self.run_levels())
            }
            None => self.run_levels(),
        }
    }

    fn run_levels(&self) -> Result<CellHierarchy> {
        let start = Instant::now();
        let sizes = &self.config.cell_sizes;
        let n_levels = sizes.len();
        let n = self.graph.node_count();

        info!(
            nodes = n,
            edges = self.graph.edge_count(),
            levels = n_levels,
            backend = self.backend.name(),
            "starting multilevel partition"
        );

        let mut levels: Vec<LevelCells> = Vec::with_capacity(n_levels);

        let coarsest = n_levels - 1;
        let level_start = Instant::now();
        let cells = self.partition_coarsest(coarsest, sizes[coarsest])?;
        let level = LevelCells::new(cells, n)?;
        log_level(coarsest, sizes[coarsest], &level, level_start);
        levels.push(level);

        for k in (0..coarsest).rev() {
            let level_start = Instant::now();
            let parent = levels.last().map(|l| l.cells.as_slice()).unwrap_or_default();
            let cells = self.refine(parent, k, sizes[k])?;
            let level = LevelCells::new(cells, n)?;
            log_level(k, sizes[k], &level, level_start);
            levels.push(level);
        }

        // built coarsest first
        levels.reverse();
        let hierarchy = CellHierarchy::build(self.graph, sizes.clone(), levels)?;

        info!(
            bits = hierarchy.layout.total_bits(),
            cut_edges = hierarchy.cut_edges.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "multilevel partition done"
        );
        Ok(hierarchy)
    }

    fn partition_coarsest(&self, level: usize, region_size: usize) -> Result<Vec<Vec<u32>>> {
        let n = self.graph.node_count();
        if n == 0 {
            return Ok(Vec::new());
        }

        let Some(threshold) = self.config.scc_threshold else {
            if n <= region_size {
                return Ok(vec![self.graph.node_ids()]);
            }
            let nodes = self.graph.node_ids();
            let request = CellRequest {
                level,
                cell_id: 0,
                nodes: &nodes,
                max_cell_size: region_size,
            };
            return self.backend.partition_cell(self.graph, &request);
        };

        let components = scc::decompose(self.graph);
        let (small, large) = components.split_by_size(threshold);
        info!(
            atomic = small.len(),
            bisected = large.len(),
            threshold,
            "scc pre-partition"
        );

        let split: Vec<Vec<Vec<u32>>> = large
            .par_iter()
            .enumerate()
            .map(|(i, component)| {
                let request = CellRequest {
                    level,
                    cell_id: i,
                    nodes: component,
                    max_cell_size: region_size,
                };
                self.backend.partition_cell(self.graph, &request)
            })
            .collect::<Result<_>>()?;

        let mut cells: Vec<Vec<u32>> = split.into_iter().flatten().collect();
        cells.extend(small.into_iter().map(|c| c.to_vec()));
        Ok(cells)
    }

    /// Split every parent cell to `region_size`; children keep parent order
    fn refine(&self, parents: &[Vec<u32>], level: usize, region_size: usize) -> Result<Vec<Vec<u32>>> {
        let children: Vec<Vec<Vec<u32>>> = parents
            .par_iter()
            .enumerate()
            .map(|(cell_id, parent)| {
                if parent.len() <= region_size {
                    return Ok(vec![parent.clone()]);
                }
                let request = CellRequest {
                    level,
                    cell_id,
                    nodes: parent,
                    max_cell_size: region_size,
                };
                self.backend.partition_cell(self.graph, &request)
            })
            .collect::<Result<_>>()?;

        Ok(children.into_iter().flatten().collect())
    }
}

fn log_level(level: usize, region_size: usize, cells: &LevelCells, started: Instant) {
    info!(
        level,
        region_size,
        cells = cells.len(),
        largest = cells.max_cell_size(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "level partitioned"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InertialFlowParams;
    use crate::error::PartitionError;
    use crate::graph::{Edge, Node};
    use crate::inertial_flow::test_graphs::grid;

    fn config(sizes: &[usize]) -> PartitionConfig {
        PartitionConfig {
            cell_sizes: sizes.to_vec(),
            inertial_flow: InertialFlowParams {
                seed: Some(17),
                ..InertialFlowParams::default()
            },
            ..PartitionConfig::default()
        }
    }

    fn assert_refines(h: &CellHierarchy) {
        for k in 0..h.level_count() - 1 {
            for cell in &h.levels[k].cells {
                let parent = h.levels[k + 1].cell_of[cell[0] as usize];
                assert!(cell
                    .iter()
                    .all(|&v| h.levels[k + 1].cell_of[v as usize] == parent));
            }
        }
    }

    #[test]
    fn test_three_levels_on_grid() {
        let g = grid(24, 24);
        let h = MultilevelPartitioner::new(&g, config(&[8, 40, 200]))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(h.level_count(), 3);
        assert_eq!(h.node_count(), 576);
        for (k, &size) in [8usize, 40, 200].iter().enumerate() {
            assert!(h.levels[k].max_cell_size() <= size);
        }
        let counts = h.cell_counts();
        assert!(counts[0] > counts[1] && counts[1] > counts[2]);
        assert_refines(&h);

        for node in 0..576u32 {
            for k in 0..3 {
                assert_eq!(h.cell_id(node, k), h.levels[k].cell_of[node as usize]);
            }
        }
    }

    #[test]
    fn test_small_graph_is_one_coarse_cell() {
        let g = grid(3, 3);
        let h = MultilevelPartitioner::new(&g, config(&[4, 100]))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(h.cell_counts()[1], 1);
        assert_eq!(h.layout.bits()[1], 0);
        assert!(h.levels[0].len() >= 2);
    }

    #[test]
    fn test_scc_prepartition_keeps_small_components_whole() {
        // a 10x10 grid plus three one-way spurs that form singleton components
        let base = grid(10, 10);
        let mut nodes = base.nodes().to_vec();
        let mut edges = base.edges().to_vec();
        for i in 0..3u32 {
            let id = 100 + i;
            nodes.push(Node::new(id, 49.0, 4.0 + i as f64 * 0.01));
            edges.push(Edge::new(id, i, 1.0, true));
        }
        let g = RoadGraph::new(nodes, edges).unwrap();

        let cfg = PartitionConfig {
            scc_threshold: Some(1),
            threads: Some(2),
            ..config(&[10, 50])
        };
        let h = MultilevelPartitioner::new(&g, cfg).unwrap().run().unwrap();

        let coarse = &h.levels[1];
        for spur in 100..103u32 {
            let cell = coarse.cell_of[spur as usize] as usize;
            assert_eq!(coarse.cells[cell], vec![spur]);
        }
        assert!(coarse.max_cell_size() <= 50);
        assert_refines(&h);
    }

    struct Broken;

    impl CellPartitioner for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn partition_cell(&self, _: &RoadGraph, request: &CellRequest<'_>) -> Result<Vec<Vec<u32>>> {
            // drops the first node of every cell
            Ok(vec![request.nodes[1..].to_vec()])
        }
    }

    #[test]
    fn test_incomplete_backend_output_is_rejected() {
        let g = grid(5, 5);
        let partitioner =
            MultilevelPartitioner::with_backend(&g, config(&[5, 10]), Box::new(Broken)).unwrap();
        assert!(matches!(partitioner.run(), Err(PartitionError::Invariant(_))));
    }

    #[test]
    fn test_invalid_config_fails_before_work() {
        let g = grid(2, 2);
        assert!(matches!(
            MultilevelPartitioner::new(&g, config(&[10, 5])),
            Err(PartitionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_graph() {
        let g = RoadGraph::new(vec![], vec![]).unwrap();
        let h = MultilevelPartitioner::new(&g, config(&[4, 16]))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(h.node_count(), 0);
        assert_eq!(h.cell_counts(), vec![0, 0]);
    }
}
