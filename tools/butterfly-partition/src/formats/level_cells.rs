//! Per-level cell file: one cell id per line, in node id order

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{IoContext, PartitionError, Result};

pub struct LevelCellsFile;

impl LevelCellsFile {
    pub fn write<P: AsRef<Path>>(path: P, cell_of: &[u32]) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path).with_path(path)?);
        for cell in cell_of {
            writeln!(writer, "{}", cell).with_path(path)?;
        }
        writer.flush().with_path(path)?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path).with_path(path)?);
        let mut cell_of = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.with_path(path)?;
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let cell = text.parse().map_err(|_| {
                PartitionError::malformed(path, format!("line {}: invalid cell id '{}'", i + 1, text))
            })?;
            cell_of.push(cell);
        }
        Ok(cell_of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("belgium.level0.txt");
        LevelCellsFile::write(&path, &[3, 0, 0, 12]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3\n0\n0\n12\n");
        assert_eq!(LevelCellsFile::read(&path).unwrap(), vec![3, 0, 0, 12]);
    }

    #[test]
    fn test_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "1\n-4\n").unwrap();
        assert!(LevelCellsFile::read(&path).is_err());
    }
}
