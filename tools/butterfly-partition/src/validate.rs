//! Hierarchy validation
//!
//! Checks that every level is a complete partition into non-empty cells, that
//! each finer cell lies inside one coarser cell, and that addresses decode
//! back to the per-level cell ids.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::{PartitionError, Result};
use crate::formats::{LevelCellsFile, Mlp, MlpFile};
use crate::hierarchy::CellHierarchy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub levels: usize,
    pub nodes: usize,
    pub cell_counts: Vec<usize>,
    pub bits: Vec<u32>,
    /// Size of the largest cell per level
    pub largest_cells: Vec<usize>,
    /// Level files compared against the decoded addresses
    pub level_files_checked: usize,
}

/// `cell_of` must use every id in `0..cell_count` and nothing else
pub fn check_level(level: usize, cell_of: &[u32], cell_count: usize) -> Result<usize> {
    let mut sizes = vec![0usize; cell_count];
    for (node, &cell) in cell_of.iter().enumerate() {
        let size = sizes.get_mut(cell as usize).ok_or_else(|| {
            PartitionError::Invariant(format!(
                "level {}: node {} in cell {} but only {} cells exist",
                level, node, cell, cell_count
            ))
        })?;
        *size += 1;
    }
    if let Some(empty) = sizes.iter().position(|&s| s == 0) {
        return Err(PartitionError::Invariant(format!(
            "level {}: cell {} has no nodes",
            level, empty
        )));
    }
    Ok(sizes.into_iter().max().unwrap_or(0))
}

/// Every cell of `finer` must map into exactly one cell of `coarser`
pub fn check_refinement(level: usize, finer: &[u32], coarser: &[u32]) -> Result<()> {
    const UNSET: u32 = u32::MAX;
    let cells = finer.iter().map(|&c| c as usize + 1).max().unwrap_or(0);
    let mut parent = vec![UNSET; cells];

    for (node, (&child, &coarse)) in finer.iter().zip(coarser).enumerate() {
        let slot = &mut parent[child as usize];
        if *slot == UNSET {
            *slot = coarse;
        } else if *slot != coarse {
            return Err(PartitionError::Invariant(format!(
                "level {} cell {} spans level {} cells {} and {} (node {})",
                level,
                child,
                level + 1,
                *slot,
                coarse,
                node
            )));
        }
    }
    Ok(())
}

/// Per-level cell ids decoded from the packed addresses
pub fn decode_levels(mlp: &Mlp) -> Result<Vec<Vec<u32>>> {
    let layout = mlp.layout()?;
    Ok((0..layout.level_count())
        .map(|k| mlp.addresses.iter().map(|&a| layout.decode(a, k)).collect())
        .collect())
}

pub fn validate_mlp(mlp: &Mlp) -> Result<ValidationReport> {
    let layout = mlp.layout()?;
    let levels = decode_levels(mlp)?;

    let mut largest_cells = Vec::with_capacity(levels.len());
    for (k, cell_of) in levels.iter().enumerate() {
        largest_cells.push(check_level(k, cell_of, mlp.cell_counts[k])?);
    }
    for k in 0..levels.len().saturating_sub(1) {
        check_refinement(k, &levels[k], &levels[k + 1])?;
    }

    Ok(ValidationReport {
        levels: levels.len(),
        nodes: mlp.addresses.len(),
        cell_counts: mlp.cell_counts.clone(),
        bits: layout.bits().to_vec(),
        largest_cells,
        level_files_checked: 0,
    })
}

/// Validate an in-memory hierarchy, including the address round trip
pub fn validate_hierarchy(hierarchy: &CellHierarchy) -> Result<ValidationReport> {
    let report = validate_mlp(&Mlp::from_hierarchy(hierarchy))?;

    for (k, level) in hierarchy.levels.iter().enumerate() {
        for (node, &cell) in level.cell_of.iter().enumerate() {
            let decoded = hierarchy.cell_id(node as u32, k);
            if decoded != cell {
                return Err(PartitionError::Invariant(format!(
                    "level {}: node {} decodes to cell {} instead of {}",
                    k, node, decoded, cell
                )));
            }
        }
        let bound = hierarchy.cell_sizes[k];
        if report.largest_cells[k] > bound {
            info!(
                level = k,
                largest = report.largest_cells[k],
                bound,
                "cell above region size (minimum cell size floor)"
            );
        }
    }

    Ok(report)
}

/// Validate a `.mlp` descriptor and compare level files (level 0 first)
/// against its decoded addresses
pub fn validate_files(mlp_path: &Path, level_files: &[PathBuf]) -> Result<ValidationReport> {
    let mlp = MlpFile::read(mlp_path)?;
    let mut report = validate_mlp(&mlp)?;
    let levels = decode_levels(&mlp)?;

    if level_files.len() > levels.len() {
        return Err(PartitionError::Invariant(format!(
            "{} level files given for {} levels",
            level_files.len(),
            levels.len()
        )));
    }

    for (k, file) in level_files.iter().enumerate() {
        let cell_of = LevelCellsFile::read(file)?;
        if cell_of.len() != levels[k].len() {
            return Err(PartitionError::Invariant(format!(
                "{}: {} entries for {} nodes",
                file.display(),
                cell_of.len(),
                levels[k].len()
            )));
        }
        if let Some(node) = (0..cell_of.len()).find(|&i| cell_of[i] != levels[k][i]) {
            return Err(PartitionError::Invariant(format!(
                "{}: node {} has cell {} but its address decodes to {}",
                file.display(),
                node,
                cell_of[node],
                levels[k][node]
            )));
        }
        report.level_files_checked += 1;
    }

    info!(
        levels = report.levels,
        nodes = report.nodes,
        level_files = report.level_files_checked,
        "hierarchy valid"
    );
    Ok(report)
}
