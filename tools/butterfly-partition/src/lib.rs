//! Hierarchical cell partitioning of road networks
//!
//! Builds nested multilevel partitions (finest level first) for customizable
//! route planning: inertial flow bisection over Dinic max-flow, optional SCC
//! pre-partitioning, or KaFFPa as an external backend. Each node's cells are
//! packed into one 64-bit address.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod formats;
pub mod graph;
pub mod hierarchy;
pub mod inertial_flow;
pub mod multilevel;
pub mod scc;
pub mod validate;

pub use backend::{CellPartitioner, CellRequest};
pub use config::{Backend, InertialFlowParams, KaffpaConfig, PartitionConfig};
pub use error::{PartitionError, Result};
pub use flow::{FlowAlgorithm, FlowNetwork, MinCut};
pub use graph::{Edge, Node, RoadGraph};
pub use hierarchy::{AddressLayout, CellHierarchy, LevelCells, OverlayStats};
pub use inertial_flow::{BisectionResult, CutEdge, InertialFlow};
pub use multilevel::MultilevelPartitioner;
pub use scc::SccDecomposition;
pub use validate::ValidationReport;
