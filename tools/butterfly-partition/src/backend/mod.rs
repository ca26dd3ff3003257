//! Cell partitioning backends
//!
//! The multilevel partitioner hands one cell at a time to a backend and gets
//! back a set of disjoint child cells covering it.

mod inertial;
mod kaffpa;

pub use inertial::InertialFlowBackend;
pub use kaffpa::{write_metis_graph, KaffpaBackend};

use crate::config::{Backend, PartitionConfig};
use crate::error::Result;
use crate::graph::RoadGraph;

/// One cell to split
#[derive(Debug, Clone, Copy)]
pub struct CellRequest<'a> {
    /// Level the resulting cells belong to
    pub level: usize,
    /// Index of the cell being split, unique within the parent level
    pub cell_id: usize,
    pub nodes: &'a [u32],
    /// Maximum size of the produced cells
    pub max_cell_size: usize,
}

pub trait CellPartitioner: Send + Sync {
    fn name(&self) -> &'static str;

    /// Split `request.nodes` into cells of at most `request.max_cell_size`
    /// nodes. The returned cells must cover the request exactly once; cut
    /// edges are derived later from the finest level.
    fn partition_cell(&self, graph: &RoadGraph, request: &CellRequest<'_>) -> Result<Vec<Vec<u32>>>;
}

/// Instantiate the backend selected by `config`
pub fn from_config(config: &PartitionConfig) -> Result<Box<dyn CellPartitioner>> {
    match config.backend {
        Backend::InertialFlow => Ok(Box::new(InertialFlowBackend::new(
            config.inertial_flow.clone(),
        ))),
        Backend::Kaffpa => Ok(Box::new(KaffpaBackend::from_config(
            &config.name,
            &config.kaffpa,
        )?)),
    }
}
