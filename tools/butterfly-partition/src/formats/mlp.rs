//! Hierarchy descriptor (`.mlp`)
//!
//! Line-oriented text, all integers:
//!
//! ```text
//! L                 level count
//! c_0 .. c_{L-1}    cell count per level, finest first, one per line
//! n                 node count
//! a_0 .. a_{n-1}    packed cell address per node, one per line
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{IoContext, PartitionError, Result};
use crate::hierarchy::{AddressLayout, CellHierarchy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mlp {
    pub cell_counts: Vec<usize>,
    pub addresses: Vec<u64>,
}

impl Mlp {
    pub fn from_hierarchy(hierarchy: &CellHierarchy) -> Self {
        Self {
            cell_counts: hierarchy.cell_counts(),
            addresses: hierarchy.addresses.clone(),
        }
    }

    pub fn layout(&self) -> Result<AddressLayout> {
        AddressLayout::new(&self.cell_counts)
    }
}

pub struct MlpFile;

impl MlpFile {
    pub fn write<P: AsRef<Path>>(path: P, mlp: &Mlp) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path).with_path(path)?);
        writeln!(writer, "{}", mlp.cell_counts.len()).with_path(path)?;
        for count in &mlp.cell_counts {
            writeln!(writer, "{}", count).with_path(path)?;
        }
        writeln!(writer, "{}", mlp.addresses.len()).with_path(path)?;
        for address in &mlp.addresses {
            writeln!(writer, "{}", address).with_path(path)?;
        }
        writer.flush().with_path(path)?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Mlp> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path).with_path(path)?);
        let mut lines = reader.lines().enumerate();

        let mut next = |what: &str| -> Result<(usize, String)> {
            match lines.next() {
                Some((i, line)) => Ok((i + 1, line.with_path(path)?)),
                None => Err(PartitionError::malformed(
                    path,
                    format!("unexpected end of file, expected {}", what),
                )),
            }
        };

        // counts come from the file, so nothing is reserved up front
        let n_levels: usize = parse(path, next("level count")?)?;
        if n_levels > u64::BITS as usize {
            return Err(PartitionError::malformed(
                path,
                format!("{} levels cannot share a 64-bit address", n_levels),
            ));
        }
        let mut cell_counts = Vec::new();
        for _ in 0..n_levels {
            cell_counts.push(parse(path, next("cell count")?)?);
        }
        let n_nodes: usize = parse(path, next("node count")?)?;
        let mut addresses = Vec::new();
        for _ in 0..n_nodes {
            addresses.push(parse(path, next("cell address")?)?);
        }

        Ok(Mlp {
            cell_counts,
            addresses,
        })
    }
}

fn parse<T: FromStr>(path: &Path, (line_no, text): (usize, String)) -> Result<T> {
    text.trim().parse().map_err(|_| {
        PartitionError::malformed(path, format!("line {}: invalid integer '{}'", line_no, text.trim()))
    })
}
