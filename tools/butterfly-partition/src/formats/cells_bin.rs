//! cells.bin format - packed cell addresses with level metadata

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::crc::{ChecksumReader, ChecksumWriter};
use crate::error::{IoContext, PartitionError, Result};

const MAGIC: u32 = 0x43454C4C; // "CELL"
const VERSION: u16 = 1;
const HEADER_LEN: usize = 48;
const FOOTER_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellsBin {
    pub n_nodes: u32,
    /// SHA-256 of the partitioned graph file, zero when unknown
    pub inputs_sha: [u8; 32],
    /// Cells per level, finest first
    pub cell_counts: Vec<u32>,
    pub addresses: Vec<u64>,
}

pub struct CellsBinFile;

impl CellsBinFile {
    pub fn write<P: AsRef<Path>>(path: P, data: &CellsBin) -> Result<()> {
        let path = path.as_ref();
        let n_levels = u16::try_from(data.cell_counts.len()).map_err(|_| {
            PartitionError::InvalidConfig(format!(
                "{} levels do not fit cells.bin",
                data.cell_counts.len()
            ))
        })?;
        if data.addresses.len() != data.n_nodes as usize {
            return Err(PartitionError::Invariant(format!(
                "{} addresses for {} nodes",
                data.addresses.len(),
                data.n_nodes
            )));
        }

        let file = File::create(path).with_path(path)?;
        let mut writer = ChecksumWriter::new(ChecksumWriter::new(BufWriter::new(file)));

        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        header[4..6].copy_from_slice(&VERSION.to_le_bytes());
        header[6..8].copy_from_slice(&n_levels.to_le_bytes());
        header[8..12].copy_from_slice(&data.n_nodes.to_le_bytes());
        // 12..16 reserved
        header[16..48].copy_from_slice(&data.inputs_sha);
        writer.write_all(&header).with_path(path)?;

        for &count in &data.cell_counts {
            writer.write_all(&count.to_le_bytes()).with_path(path)?;
        }
        for &address in &data.addresses {
            writer.write_all(&address.to_le_bytes()).with_path(path)?;
        }

        // Footer: body CRC, then the CRC of everything before the file CRC
        let (body_crc, mut file_writer) = writer.finish();
        file_writer.write_all(&body_crc.to_le_bytes()).with_path(path)?;
        let (file_crc, mut inner) = file_writer.finish();
        inner.write_all(&file_crc.to_le_bytes()).with_path(path)?;
        inner.flush().with_path(path)?;

        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<CellsBin> {
        let path = path.as_ref();
        let file = File::open(path).with_path(path)?;
        let file_len = file.metadata().with_path(path)?.len();
        let mut reader = ChecksumReader::new(ChecksumReader::new(BufReader::new(file)));

        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header).with_path(path)?;

        let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if magic != MAGIC {
            return Err(PartitionError::malformed(
                path,
                format!("invalid magic: expected 0x{:08X}, got 0x{:08X}", MAGIC, magic),
            ));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(PartitionError::malformed(
                path,
                format!("unsupported version {}", version),
            ));
        }
        let n_levels = u16::from_le_bytes([header[6], header[7]]);
        let n_nodes = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
        let mut inputs_sha = [0u8; 32];
        inputs_sha.copy_from_slice(&header[16..48]);

        let expected_len =
            HEADER_LEN as u64 + 4 * n_levels as u64 + 8 * n_nodes as u64 + FOOTER_LEN as u64;
        if file_len != expected_len {
            return Err(PartitionError::malformed(
                path,
                format!(
                    "header declares {} levels and {} nodes ({} bytes) but the file has {} bytes",
                    n_levels, n_nodes, expected_len, file_len
                ),
            ));
        }

        let mut cell_counts = Vec::with_capacity(n_levels as usize);
        let mut word = [0u8; 4];
        for _ in 0..n_levels {
            reader.read_exact(&mut word).with_path(path)?;
            cell_counts.push(u32::from_le_bytes(word));
        }

        let mut addresses = Vec::with_capacity(n_nodes as usize);
        let mut dword = [0u8; 8];
        for _ in 0..n_nodes {
            reader.read_exact(&mut dword).with_path(path)?;
            addresses.push(u64::from_le_bytes(dword));
        }

        let (computed_crc, mut file_reader) = reader.finish();
        file_reader.read_exact(&mut dword).with_path(path)?;
        let stored_crc = u64::from_le_bytes(dword);
        if computed_crc != stored_crc {
            return Err(PartitionError::malformed(
                path,
                format!(
                    "CRC64 mismatch: computed 0x{:016X}, stored 0x{:016X}",
                    computed_crc, stored_crc
                ),
            ));
        }

        let (computed_file_crc, mut inner) = file_reader.finish();
        inner.read_exact(&mut dword).with_path(path)?;
        if computed_file_crc != u64::from_le_bytes(dword) {
            return Err(PartitionError::malformed(path, "file CRC64 mismatch"));
        }

        Ok(CellsBin {
            n_nodes,
            inputs_sha,
            cell_counts,
            addresses,
        })
    }
}
