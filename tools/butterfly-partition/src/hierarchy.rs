//! Nested cell hierarchy and its packed per-node addresses
//!
//! Level 0 is the finest level. A node's address concatenates its cell id at
//! every level: level 0 in the lowest bits, the coarsest level in the highest.

use serde::Serialize;

use crate::error::{PartitionError, Result};
use crate::graph::RoadGraph;
use crate::inertial_flow::CutEdge;

/// Bits needed to store ids `0..num_cells`: `ceil(log2(num_cells))`
pub fn bits_for(num_cells: usize) -> u32 {
    if num_cells <= 1 {
        0
    } else {
        usize::BITS - (num_cells - 1).leading_zeros()
    }
}

/// Bit widths and offsets of every level inside a 64-bit address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressLayout {
    bits: Vec<u32>,
    offsets: Vec<u32>,
}

impl AddressLayout {
    /// Lay out levels with the given cell counts, finest first.
    /// Fails with `AddressOverflow` when they need more than 64 bits.
    pub fn new(cell_counts: &[usize]) -> Result<Self> {
        let bits: Vec<u32> = cell_counts.iter().map(|&c| bits_for(c)).collect();
        let total: u32 = bits.iter().sum();
        if total > u64::BITS {
            return Err(PartitionError::AddressOverflow { bits: total });
        }

        let mut offsets = Vec::with_capacity(bits.len());
        let mut offset = 0;
        for &b in &bits {
            offsets.push(offset);
            offset += b;
        }
        Ok(Self { bits, offsets })
    }

    pub fn level_count(&self) -> usize {
        self.bits.len()
    }

    pub fn bits(&self) -> &[u32] {
        &self.bits
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn total_bits(&self) -> u32 {
        self.bits.iter().sum()
    }

    fn mask(&self, level: usize) -> u64 {
        match self.bits[level] {
            0 => 0,
            64 => u64::MAX,
            b => (1u64 << b) - 1,
        }
    }

    /// Pack one cell id per level (finest first) into an address
    pub fn encode(&self, cell_ids: &[u32]) -> u64 {
        cell_ids
            .iter()
            .enumerate()
            .fold(0u64, |address, (level, &id)| {
                if self.bits[level] == 0 {
                    address
                } else {
                    address | ((id as u64 & self.mask(level)) << self.offsets[level])
                }
            })
    }

    /// Cell id of `level` inside `address`
    pub fn decode(&self, address: u64, level: usize) -> u32 {
        if self.bits[level] == 0 {
            return 0;
        }
        ((address >> self.offsets[level]) & self.mask(level)) as u32
    }
}

/// Cells of one level
#[derive(Debug, Clone, Default)]
pub struct LevelCells {
    pub cells: Vec<Vec<u32>>,
    /// Node id → cell index
    pub cell_of: Vec<u32>,
}

impl LevelCells {
    /// Index `cells` and check that they cover `0..node_count` exactly once
    pub fn new(cells: Vec<Vec<u32>>, node_count: usize) -> Result<Self> {
        const UNASSIGNED: u32 = u32::MAX;
        let mut cell_of = vec![UNASSIGNED; node_count];

        for (cell_id, cell) in cells.iter().enumerate() {
            if cell.is_empty() {
                return Err(PartitionError::Invariant(format!("cell {} is empty", cell_id)));
            }
            for &node in cell {
                let slot = cell_of.get_mut(node as usize).ok_or_else(|| {
                    PartitionError::Invariant(format!(
                        "cell {} holds unknown node {}",
                        cell_id, node
                    ))
                })?;
                if *slot != UNASSIGNED {
                    return Err(PartitionError::Invariant(format!(
                        "node {} is in cells {} and {}",
                        node, *slot, cell_id
                    )));
                }
                *slot = cell_id as u32;
            }
        }

        if let Some(node) = cell_of.iter().position(|&c| c == UNASSIGNED) {
            return Err(PartitionError::Invariant(format!(
                "node {} is not in any cell",
                node
            )));
        }

        Ok(Self { cells, cell_of })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn max_cell_size(&self) -> usize {
        self.cells.iter().map(|c| c.len()).max().unwrap_or(0)
    }
}

/// Edge counts relative to the hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverlayStats {
    /// Edges whose endpoints have different addresses
    pub overlay_edges: usize,
    /// Edges inside one finest cell
    pub inner_edges: usize,
    /// Per level, edges whose endpoints sit in different cells
    pub boundary_edges: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct CellHierarchy {
    /// Maximum cell size per level, finest first
    pub cell_sizes: Vec<usize>,
    pub levels: Vec<LevelCells>,
    pub layout: AddressLayout,
    /// Packed address per node
    pub addresses: Vec<u64>,
    /// Edges crossing finest-level cells
    pub cut_edges: Vec<CutEdge>,
}

impl CellHierarchy {
    /// Encode the levels (finest first) and collect the finest cut edges
    pub fn build(graph: &RoadGraph, cell_sizes: Vec<usize>, levels: Vec<LevelCells>) -> Result<Self> {
        let counts: Vec<usize> = levels.iter().map(|l| l.len()).collect();
        let layout = AddressLayout::new(&counts)?;

        let mut ids = vec![0u32; levels.len()];
        let addresses: Vec<u64> = (0..graph.node_count())
            .map(|node| {
                for (k, level) in levels.iter().enumerate() {
                    ids[k] = level.cell_of[node];
                }
                layout.encode(&ids)
            })
            .collect();

        let cut_edges = match levels.first() {
            Some(finest) => graph
                .edges()
                .iter()
                .filter(|e| finest.cell_of[e.from as usize] != finest.cell_of[e.to as usize])
                .map(|e| CutEdge { from: e.from, to: e.to })
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            cell_sizes,
            levels,
            layout,
            addresses,
            cut_edges,
        })
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn node_count(&self) -> usize {
        self.addresses.len()
    }

    pub fn cell_counts(&self) -> Vec<usize> {
        self.levels.iter().map(|l| l.len()).collect()
    }

    /// Cell id of `node` at `level`, read back from its address
    pub fn cell_id(&self, node: u32, level: usize) -> u32 {
        self.layout.decode(self.addresses[node as usize], level)
    }

    pub fn overlay_stats(&self, graph: &RoadGraph) -> OverlayStats {
        let mut stats = OverlayStats {
            boundary_edges: vec![0; self.levels.len()],
            ..OverlayStats::default()
        };
        for edge in graph.edges() {
            let (u, v) = (edge.from as usize, edge.to as usize);
            if self.addresses[u] != self.addresses[v] {
                stats.overlay_edges += 1;
            } else {
                stats.inner_edges += 1;
            }
            for (k, level) in self.levels.iter().enumerate() {
                if level.cell_of[u] != level.cell_of[v] {
                    stats.boundary_edges[k] += 1;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(0), 0);
        assert_eq!(bits_for(1), 0);
        assert_eq!(bits_for(2), 1);
        assert_eq!(bits_for(3), 2);
        assert_eq!(bits_for(4), 2);
        assert_eq!(bits_for(5), 3);
        assert_eq!(bits_for(1024), 10);
        assert_eq!(bits_for(1025), 11);
    }

    #[test]
    fn test_layout_offsets() {
        let layout = AddressLayout::new(&[300, 40, 5, 1]).unwrap();
        assert_eq!(layout.bits(), &[9, 6, 3, 0]);
        assert_eq!(layout.offsets(), &[0, 9, 15, 18]);
        assert_eq!(layout.total_bits(), 18);
    }

    #[test]
    fn test_encode_decode_every_id() {
        let counts = [37usize, 9, 3];
        let layout = AddressLayout::new(&counts).unwrap();
        for a in 0..37u32 {
            for b in 0..9u32 {
                for c in 0..3u32 {
                    let address = layout.encode(&[a, b, c]);
                    assert_eq!(layout.decode(address, 0), a);
                    assert_eq!(layout.decode(address, 1), b);
                    assert_eq!(layout.decode(address, 2), c);
                }
            }
        }
    }

    #[test]
    fn test_full_64_bits() {
        let counts = [1usize << 32, 1usize << 32];
        let layout = AddressLayout::new(&counts).unwrap();
        assert_eq!(layout.total_bits(), 64);
        let address = layout.encode(&[u32::MAX, 7]);
        assert_eq!(layout.decode(address, 0), u32::MAX);
        assert_eq!(layout.decode(address, 1), 7);
    }

    #[test]
    fn test_overflow() {
        let counts = [1usize << 40, 1usize << 30];
        assert!(matches!(
            AddressLayout::new(&counts),
            Err(PartitionError::AddressOverflow { bits: 70 })
        ));
    }

    #[test]
    fn test_level_cells_checks_cover() {
        assert!(LevelCells::new(vec![vec![0, 2], vec![1]], 3).is_ok());
        assert!(LevelCells::new(vec![vec![0, 2]], 3).is_err());
        assert!(LevelCells::new(vec![vec![0, 2], vec![2, 1]], 3).is_err());
        assert!(LevelCells::new(vec![vec![0, 1, 2], vec![]], 3).is_err());
        assert!(LevelCells::new(vec![vec![0, 1, 5]], 3).is_err());
    }

    #[test]
    fn test_hierarchy_addresses_and_stats() {
        let nodes = (0..4).map(|i| Node::new(i, 0.0, i as f64)).collect();
        let edges = vec![
            Edge::new(0, 1, 1.0, false),
            Edge::new(1, 2, 1.0, false),
            Edge::new(2, 3, 1.0, false),
        ];
        let g = RoadGraph::new(nodes, edges).unwrap();

        let finest = LevelCells::new(vec![vec![0], vec![1], vec![2, 3]], 4).unwrap();
        let coarse = LevelCells::new(vec![vec![0, 1], vec![2, 3]], 4).unwrap();
        let h = CellHierarchy::build(&g, vec![2, 4], vec![finest, coarse]).unwrap();

        assert_eq!(h.cell_counts(), vec![3, 2]);
        for node in 0..4u32 {
            for k in 0..2 {
                assert_eq!(h.cell_id(node, k), h.levels[k].cell_of[node as usize]);
            }
        }
        assert_eq!(h.cut_edges, vec![CutEdge { from: 0, to: 1 }, CutEdge { from: 1, to: 2 }]);

        let stats = h.overlay_stats(&g);
        assert_eq!(stats.overlay_edges, 2);
        assert_eq!(stats.inner_edges, 1);
        assert_eq!(stats.boundary_edges, vec![2, 1]);
    }
}
