//! CLI commands for butterfly-partition

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{Backend, PartitionConfig};
use crate::flow::FlowAlgorithm;
use crate::formats::{self, diagnostics, GraphTextFile, LevelCellsFile, OutputOptions};
use crate::graph::RoadGraph;
use crate::hierarchy::LevelCells;
use crate::inertial_flow::InertialFlow;
use crate::multilevel::MultilevelPartitioner;
use crate::{scc, validate};

#[derive(Parser)]
#[command(name = "butterfly-partition")]
#[command(about = "Multilevel cell partitioning for customizable route planning", long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the nested cell hierarchy and write level files, .mlp and cells.bin
    Partition(PartitionArgs),

    /// Single-level inertial flow partition at one region size
    Bisect {
        /// Input graph (.graph.txt)
        #[arg(long)]
        graph: PathBuf,

        /// Output directory
        #[arg(short, long)]
        outdir: PathBuf,

        /// Maximum cell size
        #[arg(long)]
        region_size: usize,

        /// Output file stem
        #[arg(long, default_value = "bisect")]
        name: String,

        /// Seed for projection lines
        #[arg(long)]
        seed: Option<u64>,

        /// Max-flow algorithm (dinic or edmonds-karp)
        #[arg(long, default_value = "dinic")]
        flow_algorithm: FlowAlgorithm,
    },

    /// Report strongly connected components
    Scc {
        /// Input graph (.graph.txt)
        #[arg(long)]
        graph: PathBuf,

        /// Number of largest components to list
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Check a hierarchy descriptor and its level files
    Validate {
        /// Hierarchy descriptor (.mlp)
        #[arg(long)]
        hierarchy: PathBuf,

        /// Level files, finest level first
        #[arg(long = "level-file")]
        level_files: Vec<PathBuf>,
    },
}

#[derive(Args)]
pub struct PartitionArgs {
    /// Input graph (.graph.txt)
    #[arg(long)]
    pub graph: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub outdir: PathBuf,

    /// TOML config; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output file stem
    #[arg(long)]
    pub name: Option<String>,

    /// Maximum cell size per level, finest first (e.g. 256,2048,16384)
    #[arg(long, value_delimiter = ',')]
    pub cell_sizes: Option<Vec<usize>>,

    /// Expected level count
    #[arg(long)]
    pub levels: Option<usize>,

    /// Pre-partition by SCC; components up to this size stay whole
    #[arg(long)]
    pub scc_threshold: Option<usize>,

    /// inertial-flow or kaffpa
    #[arg(long)]
    pub backend: Option<Backend>,

    /// Path to the kaffpa binary
    #[arg(long)]
    pub kaffpa_bin: Option<PathBuf>,

    /// Worker threads (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Seed for projection lines and samples
    #[arg(long)]
    pub seed: Option<u64>,

    /// Max-flow algorithm (dinic or edmonds-karp)
    #[arg(long)]
    pub flow_algorithm: Option<FlowAlgorithm>,

    /// Skip cut-edge and sample JSON
    #[arg(long)]
    pub no_diagnostics: bool,
}

impl PartitionArgs {
    /// Config file (or defaults) with the command-line overrides applied
    pub fn resolve_config(&self) -> Result<PartitionConfig> {
        let mut config = match &self.config {
            Some(path) => PartitionConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PartitionConfig::default(),
        };

        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(sizes) = &self.cell_sizes {
            config.cell_sizes = sizes.clone();
        }
        if self.levels.is_some() {
            config.levels = self.levels;
        }
        if self.scc_threshold.is_some() {
            config.scc_threshold = self.scc_threshold;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(bin) = &self.kaffpa_bin {
            config.kaffpa.binary = Some(bin.clone());
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if self.seed.is_some() {
            config.inertial_flow.seed = self.seed;
        }
        if let Some(algorithm) = self.flow_algorithm {
            config.inertial_flow.flow_algorithm = algorithm;
        }
        if self.no_diagnostics {
            config.diagnostics = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn load_graph(path: &Path) -> Result<RoadGraph> {
    println!("Loading graph...");
    let graph = GraphTextFile::read(path)
        .with_context(|| format!("Failed to load graph {}", path.display()))?;
    println!("  ✓ {} nodes, {} edges", graph.node_count(), graph.edge_count());
    Ok(graph)
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Partition(args) => run_partition(&args),
        Commands::Bisect {
            graph,
            outdir,
            region_size,
            name,
            seed,
            flow_algorithm,
        } => run_bisect(graph, outdir, region_size, name, seed, flow_algorithm),
        Commands::Scc { graph, top } => run_scc(graph, top),
        Commands::Validate {
            hierarchy,
            level_files,
        } => run_validate(hierarchy, level_files),
    }
}

fn run_partition(args: &PartitionArgs) -> Result<()> {
    let start = Instant::now();
    let config = args.resolve_config()?;

    println!("\n🧩 Multilevel partition ({} levels)\n", config.level_count());
    let graph = load_graph(&args.graph)?;
    let inputs_sha = formats::file_sha256(&args.graph)?;
    println!("  ✓ Input SHA-256: {}", hex::encode(inputs_sha));

    println!("\nPartitioning...");
    let partitioner = MultilevelPartitioner::new(&graph, config.clone())?;
    let hierarchy = partitioner.run().context("Partitioning failed")?;
    for (k, level) in hierarchy.levels.iter().enumerate() {
        println!(
            "  ✓ level {}: {} cells (max {} nodes, bound {}, {} bits)",
            k,
            level.len(),
            level.max_cell_size(),
            config.cell_sizes[k],
            hierarchy.layout.bits()[k]
        );
    }

    let stats = hierarchy.overlay_stats(&graph);
    println!(
        "  ✓ {} overlay edges, {} inner edges",
        stats.overlay_edges, stats.inner_edges
    );

    println!("\nValidating...");
    validate::validate_hierarchy(&hierarchy)?;
    println!("  ✓ levels nest and addresses decode");

    println!("\nWriting output...");
    let written = formats::write_outputs(
        &args.outdir,
        &graph,
        &hierarchy,
        &OutputOptions {
            name: config.name.clone(),
            inputs_sha: Some(inputs_sha),
            diagnostics: config.diagnostics,
            sample_fraction: config.sample_fraction,
            seed: config.inertial_flow.seed,
        },
    )?;
    for path in &written {
        println!("  ✓ Written {}", path.display());
    }

    println!("\n✅ Partition complete in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn run_bisect(
    graph_path: PathBuf,
    outdir: PathBuf,
    region_size: usize,
    name: String,
    seed: Option<u64>,
    flow_algorithm: FlowAlgorithm,
) -> Result<()> {
    anyhow::ensure!(region_size > 0, "region size must be positive");
    let start = Instant::now();
    let mut config = PartitionConfig::default();
    config.inertial_flow.seed = seed;
    config.inertial_flow.flow_algorithm = flow_algorithm;

    println!("\n✂️  Inertial flow partition (region size {})\n", region_size);
    let graph = load_graph(&graph_path)?;

    println!("\nBisecting...");
    let bisector = InertialFlow::new(&graph, config.inertial_flow.clone());
    let result = bisector.partition_graph(region_size);
    println!(
        "  ✓ {} regions, {} boundary edges (cut weight {:.1})",
        result.cells.len(),
        result.cut_edges.len(),
        result.cut_weight
    );

    let cells = LevelCells::new(result.cells, graph.node_count())?;

    println!("\nWriting output...");
    std::fs::create_dir_all(&outdir)
        .with_context(|| format!("Failed to create {}", outdir.display()))?;
    let cells_path = outdir.join(formats::level_file_name(&name, 0));
    LevelCellsFile::write(&cells_path, &cells.cell_of)?;
    println!("  ✓ Written {}", cells_path.display());

    let cut_path = outdir.join(format!("{}.cut_edges.json", name));
    diagnostics::write_json(
        &cut_path,
        &diagnostics::cut_edge_coords(&graph, &result.cut_edges),
    )?;
    println!("  ✓ Written {}", cut_path.display());

    let samples_path = outdir.join(format!("{}.level0.samples.json", name));
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let samples = diagnostics::sample_cells(&graph, &cells.cells, config.sample_fraction, &mut rng);
    diagnostics::write_json(&samples_path, &samples)?;
    println!("  ✓ Written {}", samples_path.display());

    println!("\n✅ Bisection complete in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn run_scc(graph_path: PathBuf, top: usize) -> Result<()> {
    let graph = load_graph(&graph_path)?;

    println!("\nFinding strongly connected components...");
    let components = scc::decompose(&graph);
    println!("  ✓ {} components", components.len());
    for (i, comp) in components.components.iter().take(top).enumerate() {
        println!("    Component {}: {} nodes", i, comp.len());
    }
    if components.len() > top {
        println!("    ... and {} more components", components.len() - top);
    }
    let singletons = components.components.iter().filter(|c| c.len() == 1).count();
    println!("  ✓ {} single-node components", singletons);
    Ok(())
}

fn run_validate(hierarchy: PathBuf, level_files: Vec<PathBuf>) -> Result<()> {
    println!("\n🔐 Validating {}\n", hierarchy.display());
    let report = validate::validate_files(&hierarchy, &level_files)
        .with_context(|| format!("Validation of {} failed", hierarchy.display()))?;

    println!("  ✓ {} levels, {} nodes", report.levels, report.nodes);
    for k in 0..report.levels {
        println!(
            "  ✓ level {}: {} cells, largest {} nodes, {} bits",
            k, report.cell_counts[k], report.largest_cells[k], report.bits[k]
        );
    }
    println!("  ✓ {} level files match the addresses", report.level_files_checked);
    println!("\n✅ Hierarchy valid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("p.toml");
        std::fs::write(&config_path, "name = \"from-file\"\ncell_sizes = [10, 100]\n").unwrap();

        let cli = Cli::try_parse_from([
            "butterfly-partition",
            "partition",
            "--graph",
            "g.graph.txt",
            "--outdir",
            "out",
            "--config",
            config_path.to_str().unwrap(),
            "--cell-sizes",
            "8,64,512",
            "--seed",
            "5",
            "--no-diagnostics",
        ])
        .unwrap();

        let Commands::Partition(args) = cli.command else {
            panic!("expected partition command");
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.name, "from-file");
        assert_eq!(config.cell_sizes, vec![8, 64, 512]);
        assert_eq!(config.inertial_flow.seed, Some(5));
        assert!(!config.diagnostics);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let cli = Cli::try_parse_from([
            "butterfly-partition",
            "partition",
            "--graph",
            "g.graph.txt",
            "--outdir",
            "out",
            "--cell-sizes",
            "64,8",
        ])
        .unwrap();
        let Commands::Partition(args) = cli.command else {
            panic!("expected partition command");
        };
        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn test_global_log_json_and_validate_args() {
        let cli = Cli::try_parse_from([
            "butterfly-partition",
            "validate",
            "--hierarchy",
            "x.mlp",
            "--level-file",
            "x.level0.txt",
            "--level-file",
            "x.level1.txt",
            "--log-json",
        ])
        .unwrap();
        assert!(cli.log_json);
        match cli.command {
            Commands::Validate { level_files, .. } => assert_eq!(level_files.len(), 2),
            _ => panic!("expected validate command"),
        }
    }
}
