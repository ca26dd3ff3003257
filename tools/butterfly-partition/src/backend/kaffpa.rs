//! KaFFPa (KaHIP) as an external cell partitioner
//!
//! Each cell is written as a METIS graph, `kaffpa` is run on it and the part
//! file (one part id per line, in vertex order) is read back.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use super::{CellPartitioner, CellRequest};
use crate::config::KaffpaConfig;
use crate::error::{IoContext, PartitionError, Result};
use crate::graph::RoadGraph;

#[derive(Debug, Clone)]
pub struct KaffpaBackend {
    binary: PathBuf,
    work_dir: PathBuf,
    preconfiguration: String,
    /// Prefix of the per-cell work files
    name: String,
}

impl KaffpaBackend {
    pub fn new(
        binary: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        preconfiguration: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            work_dir: work_dir.into(),
            preconfiguration: preconfiguration.into(),
            name: name.into(),
        }
    }

    pub fn from_config(name: &str, config: &KaffpaConfig) -> Result<Self> {
        let binary = config.binary.clone().ok_or_else(|| {
            PartitionError::InvalidConfig("the kaffpa backend needs kaffpa.binary".to_string())
        })?;
        Ok(Self::new(
            binary,
            config.work_dir.clone(),
            config.preconfiguration.clone(),
            name,
        ))
    }

    fn graph_path(&self, level: usize, cell_id: usize) -> PathBuf {
        self.work_dir
            .join(format!("{}_level_{}_cell_{}.graph", self.name, level, cell_id))
    }

    fn part_path(&self, level: usize, cell_id: usize) -> PathBuf {
        self.work_dir
            .join(format!("{}_level_{}_cell_{}_part", self.name, level, cell_id))
    }

    fn run(&self, request: &CellRequest<'_>, graph_file: &Path, part_file: &Path, k: usize) -> Result<()> {
        let failed = |reason: String| PartitionError::ExternalPartitioner {
            level: request.level,
            cell_id: request.cell_id,
            reason,
        };

        let output = Command::new(&self.binary)
            .arg(graph_file)
            .arg(format!("--output={}", part_file.display()))
            .arg(format!("--k={}", k))
            .arg(format!("--preconfiguration={}", self.preconfiguration))
            .output()
            .map_err(|e| failed(format!("cannot run {}: {}", self.binary.display(), e)))?;

        if !output.status.success() {
            return Err(failed(format!(
                "{} ({})",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.is_empty() && output.stderr.is_empty() {
            return Err(failed("partitioner produced no output".to_string()));
        }

        debug!(
            level = request.level,
            cell = request.cell_id,
            output = %String::from_utf8_lossy(&output.stdout).trim(),
            "kaffpa finished"
        );
        Ok(())
    }
}

impl CellPartitioner for KaffpaBackend {
    fn name(&self) -> &'static str {
        "kaffpa"
    }

    fn partition_cell(&self, graph: &RoadGraph, request: &CellRequest<'_>) -> Result<Vec<Vec<u32>>> {
        let n = request.nodes.len();
        let k = n.div_ceil(request.max_cell_size.max(1));
        if k <= 1 {
            return Ok(vec![request.nodes.to_vec()]);
        }

        let graph_file = self.graph_path(request.level, request.cell_id);
        let part_file = self.part_path(request.level, request.cell_id);

        info!(
            level = request.level,
            cell = request.cell_id,
            nodes = n,
            k,
            "running kaffpa"
        );
        write_metis_graph(&graph_file, graph, request.nodes)?;
        self.run(request, &graph_file, &part_file, k)?;
        let parts = read_part_file(&part_file, n)?;

        let mut cells: Vec<Vec<u32>> = Vec::new();
        for (i, &part) in parts.iter().enumerate() {
            if cells.len() <= part {
                cells.resize_with(part + 1, Vec::new);
            }
            cells[part].push(request.nodes[i]);
        }
        cells.retain(|c| !c.is_empty());

        Ok(cells)
    }
}

/// Quantize a road weight into a positive METIS edge weight
fn metis_weight(weight: f64) -> i64 {
    (weight * 100.0) as i64 + 1
}

/// Write the subgraph induced by `nodes` in METIS format.
///
/// Vertices are numbered `1..=n` in the order of `nodes`. Direction is
/// dropped: u and v are adjacent when either u -> v or v -> u exists, with the
/// lightest connecting edge as weight, so the adjacency stays symmetric.
/// Self-loops are skipped.
pub fn write_metis_graph(path: &Path, graph: &RoadGraph, nodes: &[u32]) -> Result<()> {
    let local: FxHashMap<u32, u32> = nodes
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i as u32 + 1))
        .collect();

    let mut pair_weight: FxHashMap<(u32, u32), f64> = FxHashMap::default();
    let mut adjacency: Vec<Vec<u32>> = vec![Vec::new(); nodes.len()];
    let mut seen: FxHashSet<u32> = FxHashSet::default();

    for (i, &u) in nodes.iter().enumerate() {
        let lu = i as u32 + 1;
        seen.clear();

        let out = graph.out_edges(u).iter().map(|e| (e.to, e.weight));
        let inc = graph.in_edges(u).iter().map(|e| (e.from, e.weight));
        for (v, weight) in out.chain(inc) {
            if v == u {
                continue;
            }
            let Some(&lv) = local.get(&v) else {
                continue;
            };
            let key = (lu.min(lv), lu.max(lv));
            pair_weight
                .entry(key)
                .and_modify(|w| *w = w.min(weight))
                .or_insert(weight);
            if seen.insert(lv) {
                adjacency[i].push(lv);
            }
        }
    }

    let entries: usize = adjacency.iter().map(|a| a.len()).sum();
    let mut writer = BufWriter::new(File::create(path).with_path(path)?);
    writeln!(writer, "{} {} 1", nodes.len(), entries / 2).with_path(path)?;
    for (i, neighbors) in adjacency.iter().enumerate() {
        let lu = i as u32 + 1;
        let line: Vec<String> = neighbors
            .iter()
            .map(|&lv| {
                let weight = pair_weight[&(lu.min(lv), lu.max(lv))];
                format!("{} {}", lv, metis_weight(weight))
            })
            .collect();
        writeln!(writer, "{}", line.join(" ")).with_path(path)?;
    }
    writer.flush().with_path(path)?;
    Ok(())
}

/// Read `n` part ids, one per line
fn read_part_file(path: &Path, n: usize) -> Result<Vec<usize>> {
    let reader = BufReader::new(File::open(path).with_path(path)?);
    let mut parts = Vec::with_capacity(n);

    for line in reader.lines() {
        if parts.len() == n {
            break;
        }
        let line = line.with_path(path)?;
        let part: usize = line.trim().parse().map_err(|_| {
            PartitionError::malformed(
                path,
                format!("line {}: '{}' is not a part id", parts.len() + 1, line.trim()),
            )
        })?;
        if part >= n {
            return Err(PartitionError::malformed(
                path,
                format!("part id {} out of range for {} vertices", part, n),
            ));
        }
        parts.push(part);
    }

    if parts.len() != n {
        return Err(PartitionError::malformed(
            path,
            format!("expected {} part ids, found {}", n, parts.len()),
        ));
    }
    Ok(parts)
}
