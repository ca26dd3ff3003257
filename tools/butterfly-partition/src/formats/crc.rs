//! CRC-64 (GO-ISO) over binary artifacts
//!
//! [`ChecksumWriter`] and [`ChecksumReader`] wrap a stream and checksum every
//! byte that passes through, so writers and readers of `cells.bin` never
//! buffer the body twice.

use std::io::{self, Read, Write};

use crc::{Crc, Digest, CRC_64_GO_ISO};

pub const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

pub fn crc64(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

pub struct ChecksumWriter<W: Write> {
    inner: W,
    digest: Digest<'static, u64>,
}

impl<W: Write> ChecksumWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            digest: CRC64.digest(),
        }
    }

    /// Checksum of everything written so far, plus the inner writer for the footer
    pub fn finish(self) -> (u64, W) {
        (self.digest.finalize(), self.inner)
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub struct ChecksumReader<R: Read> {
    inner: R,
    digest: Digest<'static, u64>,
}

impl<R: Read> ChecksumReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            digest: CRC64.digest(),
        }
    }

    pub fn finish(self) -> (u64, R) {
        (self.digest.finalize(), self.inner)
    }
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_checksums_match_one_shot() {
        let addresses: Vec<u8> = (0u64..64).flat_map(|a| (a * 977).to_le_bytes()).collect();

        let mut writer = ChecksumWriter::new(Vec::new());
        for chunk in addresses.chunks(24) {
            writer.write_all(chunk).unwrap();
        }
        let (written_crc, bytes) = writer.finish();
        assert_eq!(bytes, addresses);
        assert_eq!(written_crc, crc64(&addresses));

        let mut reader = ChecksumReader::new(addresses.as_slice());
        let mut head = [0u8; 100];
        reader.read_exact(&mut head).unwrap();
        let (read_crc, rest) = reader.finish();
        assert_eq!(read_crc, crc64(&addresses[..100]));
        assert_eq!(rest.len(), addresses.len() - 100);
    }
}
