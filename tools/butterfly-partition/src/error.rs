//! Error types for the partitioning library
//!
//! Setup problems (bad configuration, malformed graphs) are reported before any
//! work starts. Everything else aborts the level being processed; there are no
//! retries and no partially written levels.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PartitionError {
    /// Rejected run configuration (level sizes, thresholds, backend settings)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Graph violates the dense-id / edge-endpoint contract
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external partitioner failed for one cell
    #[error("External partitioner failed on level {level}, cell {cell_id}: {reason}")]
    ExternalPartitioner {
        level: usize,
        cell_id: usize,
        reason: String,
    },

    #[error("Malformed file {}: {reason}", path.display())]
    MalformedFile { path: PathBuf, reason: String },

    /// The per-level cell ids do not fit into one 64-bit address
    #[error("Cell hierarchy needs {bits} bits, exceeding the 64-bit cell address")]
    AddressOverflow { bits: u32 },

    /// A partition broke completeness, disjointness or refinement
    #[error("Partition invariant violated: {0}")]
    Invariant(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl PartitionError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        PartitionError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn malformed(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        PartitionError::MalformedFile {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Convenience result type for partitioning operations
pub type Result<T> = std::result::Result<T, PartitionError>;

/// Attach a path to `std::io::Result`s
pub(crate) trait IoContext<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| PartitionError::io(path, e))
    }
}
