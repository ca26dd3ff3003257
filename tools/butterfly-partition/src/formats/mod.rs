//! Input and output files of the partitioner

pub mod cells_bin;
pub mod crc;
pub mod diagnostics;
pub mod graph_text;
pub mod level_cells;
pub mod mlp;

pub use cells_bin::{CellsBin, CellsBinFile};
pub use graph_text::GraphTextFile;
pub use level_cells::LevelCellsFile;
pub use mlp::{Mlp, MlpFile};

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{IoContext, PartitionError, Result};
use crate::graph::RoadGraph;
use crate::hierarchy::CellHierarchy;

/// SHA-256 of a file's contents
pub fn file_sha256<P: AsRef<Path>>(path: P) -> Result<[u8; 32]> {
    let path = path.as_ref();
    let mut file = File::open(path).with_path(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).with_path(path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    Ok(hash)
}

/// What to write next to the level files
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub name: String,
    /// SHA-256 of the input graph, recorded in cells.bin
    pub inputs_sha: Option<[u8; 32]>,
    pub diagnostics: bool,
    pub sample_fraction: f64,
    /// Seed for the cell samples
    pub seed: Option<u64>,
}

pub fn level_file_name(name: &str, level: usize) -> String {
    format!("{}.level{}.txt", name, level)
}

/// Write every artifact of a hierarchy into `outdir`. Returns the written paths.
pub fn write_outputs(
    outdir: &Path,
    graph: &RoadGraph,
    hierarchy: &CellHierarchy,
    options: &OutputOptions,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(outdir).with_path(outdir)?;
    let name = &options.name;
    let mut written = Vec::new();

    for (k, level) in hierarchy.levels.iter().enumerate() {
        let path = outdir.join(level_file_name(name, k));
        LevelCellsFile::write(&path, &level.cell_of)?;
        written.push(path);
    }

    let mlp_path = outdir.join(format!("{}.mlp", name));
    MlpFile::write(&mlp_path, &Mlp::from_hierarchy(hierarchy))?;
    written.push(mlp_path);

    let n_nodes = u32::try_from(hierarchy.node_count())
        .map_err(|_| PartitionError::InvalidGraph("node count exceeds u32".to_string()))?;
    let cells_path = outdir.join(format!("{}.cells.bin", name));
    CellsBinFile::write(
        &cells_path,
        &CellsBin {
            n_nodes,
            inputs_sha: options.inputs_sha.unwrap_or([0u8; 32]),
            cell_counts: hierarchy.levels.iter().map(|l| l.len() as u32).collect(),
            addresses: hierarchy.addresses.clone(),
        },
    )?;
    written.push(cells_path);

    if options.diagnostics {
        let cut_path = outdir.join(format!("{}.cut_edges.json", name));
        diagnostics::write_json(
            &cut_path,
            &diagnostics::cut_edge_coords(graph, &hierarchy.cut_edges),
        )?;
        written.push(cut_path);

        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        for (k, level) in hierarchy.levels.iter().enumerate() {
            let path = outdir.join(format!("{}.level{}.samples.json", name, k));
            let samples =
                diagnostics::sample_cells(graph, &level.cells, options.sample_fraction, &mut rng);
            diagnostics::write_json(&path, &samples)?;
            written.push(path);
        }
    }

    info!(files = written.len(), outdir = %outdir.display(), "wrote partition outputs");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};
    use crate::hierarchy::LevelCells;

    #[test]
    fn test_file_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            hex::encode(file_sha256(&path).unwrap()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_write_outputs_file_set() {
        let nodes = (0..4).map(|i| Node::new(i, 50.0, 4.0 + i as f64)).collect();
        let edges = (0..3).map(|i| Edge::new(i, i + 1, 1.0, false)).collect();
        let g = RoadGraph::new(nodes, edges).unwrap();
        let levels = vec![
            LevelCells::new(vec![vec![0, 1], vec![2, 3]], 4).unwrap(),
            LevelCells::new(vec![vec![0, 1, 2, 3]], 4).unwrap(),
        ];
        let h = CellHierarchy::build(&g, vec![2, 4], levels).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let outdir = dir.path().join("out");
        let options = OutputOptions {
            name: "line".to_string(),
            inputs_sha: None,
            diagnostics: true,
            sample_fraction: 0.5,
            seed: Some(1),
        };
        let written = write_outputs(&outdir, &g, &h, &options).unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "line.level0.txt",
                "line.level1.txt",
                "line.mlp",
                "line.cells.bin",
                "line.cut_edges.json",
                "line.level0.samples.json",
                "line.level1.samples.json",
            ]
        );

        let bin = CellsBinFile::read(outdir.join("line.cells.bin")).unwrap();
        assert_eq!(bin.addresses, h.addresses);
        assert_eq!(bin.inputs_sha, [0u8; 32]);
        assert_eq!(LevelCellsFile::read(outdir.join("line.level0.txt")).unwrap(), vec![0, 0, 1, 1]);
    }
}
