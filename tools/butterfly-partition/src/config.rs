//! Run configuration for the multilevel partitioner
//!
//! Loaded from TOML (every field optional) and then overridden by CLI flags.
//! `validate()` runs before any work starts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IoContext, PartitionError, Result};
use crate::flow::FlowAlgorithm;

/// Default maximum cell sizes, finest level first: 2^8, 2^11, 2^14, 2^17, 2^20
pub const DEFAULT_CELL_SIZES: [usize; 5] = [256, 2_048, 16_384, 131_072, 1_048_576];

/// Which partitioner splits a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    #[default]
    InertialFlow,
    Kaffpa,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "inertial-flow" | "inertial" => Ok(Backend::InertialFlow),
            "kaffpa" => Ok(Backend::Kaffpa),
            other => Err(format!(
                "unknown backend '{}' (expected inertial-flow or kaffpa)",
                other
            )),
        }
    }
}

/// Inertial flow bisection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InertialFlowParams {
    /// Cells at or below this size are never split, whatever the region size
    pub min_cell_size: usize,
    /// Share of the projected order taken as sources (and as sinks)
    pub source_sink_fraction: f64,
    /// Random projection directions added to the four fixed ones
    pub random_lines: usize,
    /// Seed for line selection; unseeded runs differ between invocations
    pub seed: Option<u64>,
    /// Both halves must reach this size before recursing in parallel
    pub parallel_threshold: usize,
    pub flow_algorithm: FlowAlgorithm,
}

impl Default for InertialFlowParams {
    fn default() -> Self {
        Self {
            min_cell_size: 5,
            source_sink_fraction: 0.25,
            random_lines: 0,
            seed: None,
            parallel_threshold: 50_000,
            flow_algorithm: FlowAlgorithm::Dinic,
        }
    }
}

/// External KaFFPa partitioner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KaffpaConfig {
    pub binary: Option<PathBuf>,
    /// Where per-cell METIS graphs and part files are written
    pub work_dir: PathBuf,
    pub preconfiguration: String,
}

impl Default for KaffpaConfig {
    fn default() -> Self {
        Self {
            binary: None,
            work_dir: std::env::temp_dir(),
            preconfiguration: "strong".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Output file stem
    pub name: String,
    /// Maximum cell size per level, finest (level 0) first, strictly increasing
    pub cell_sizes: Vec<usize>,
    /// Explicit level count; must agree with `cell_sizes` when set
    pub levels: Option<usize>,
    /// Enables SCC pre-partitioning of the coarsest level. Components of at most
    /// this many nodes become cells as they are.
    pub scc_threshold: Option<usize>,
    pub backend: Backend,
    /// Worker pool size; `None` uses every core
    pub threads: Option<usize>,
    /// Write cut-edge and cell-sample JSON next to the level files
    pub diagnostics: bool,
    /// Share of each cell's nodes written to the sample JSON
    pub sample_fraction: f64,
    pub inertial_flow: InertialFlowParams,
    pub kaffpa: KaffpaConfig,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            name: "partition".to_string(),
            cell_sizes: DEFAULT_CELL_SIZES.to_vec(),
            levels: None,
            scc_threshold: None,
            backend: Backend::InertialFlow,
            threads: None,
            diagnostics: true,
            sample_fraction: 0.3,
            inertial_flow: InertialFlowParams::default(),
            kaffpa: KaffpaConfig::default(),
        }
    }
}

impl PartitionConfig {
    /// Parse a TOML config. Missing keys fall back to defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_path(path)?;
        Self::from_toml_str(&text)
    }

    pub fn level_count(&self) -> usize {
        self.cell_sizes.len()
    }

    /// Region size of the coarsest level
    pub fn coarsest_cell_size(&self) -> usize {
        self.cell_sizes.last().copied().unwrap_or(0)
    }

    /// Reject configurations the partitioner cannot honor
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PartitionError::InvalidConfig(msg));

        if self.name.is_empty() {
            return invalid("name must not be empty".to_string());
        }
        if self.cell_sizes.is_empty() {
            return invalid("cell_sizes must list at least one level".to_string());
        }
        if self.cell_sizes.contains(&0) {
            return invalid("cell sizes must be positive".to_string());
        }
        for pair in self.cell_sizes.windows(2) {
            if pair[0] >= pair[1] {
                return invalid(format!(
                    "cell sizes must be strictly increasing (finest first), got {:?}",
                    self.cell_sizes
                ));
            }
        }
        if let Some(levels) = self.levels {
            if levels != self.cell_sizes.len() {
                return invalid(format!(
                    "levels = {} but {} cell sizes were given",
                    levels,
                    self.cell_sizes.len()
                ));
            }
        }
        if let Some(threshold) = self.scc_threshold {
            if threshold > self.coarsest_cell_size() {
                return invalid(format!(
                    "scc_threshold {} exceeds the coarsest cell size {}",
                    threshold,
                    self.coarsest_cell_size()
                ));
            }
        }
        if self.threads == Some(0) {
            return invalid("threads must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.sample_fraction) {
            return invalid(format!(
                "sample_fraction must be within [0, 1], got {}",
                self.sample_fraction
            ));
        }

        let params = &self.inertial_flow;
        if !(params.source_sink_fraction > 0.0 && params.source_sink_fraction <= 0.5) {
            return invalid(format!(
                "source_sink_fraction must be within (0, 0.5], got {}",
                params.source_sink_fraction
            ));
        }
        if params.min_cell_size < 2 {
            return invalid(format!(
                "min_cell_size must be at least 2, got {}",
                params.min_cell_size
            ));
        }

        if self.backend == Backend::Kaffpa {
            if self.kaffpa.binary.is_none() {
                return invalid("the kaffpa backend needs kaffpa.binary".to_string());
            }
            if self.kaffpa.preconfiguration.is_empty() {
                return invalid("kaffpa.preconfiguration must not be empty".to_string());
            }
        }

        Ok(())
    }
}
