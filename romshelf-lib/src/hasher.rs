//! Streaming content fingerprints.
//!
//! Files are read once in fixed-size chunks, so memory use does not depend
//! on file size. CRC32 uses the IEEE 802.3 reflected polynomial
//! (0xEDB88320) via `crc32fast`, whose tables are built at compile time.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha1::Digest;

const CHUNK_SIZE: usize = 64 * 1024; // 64 KB

/// Fingerprint of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHashes {
    pub size_bytes: u64,
    /// 8 lowercase hex chars.
    pub crc32: String,
    /// 40 lowercase hex chars.
    pub sha1: String,
}

/// Compute size, CRC32 and SHA1 of the file at `path` in a single pass.
///
/// Any read error aborts the whole computation; a partial hash is never
/// returned.
pub fn hash_file(path: &Path) -> io::Result<FileHashes> {
    let mut file = File::open(path)?;
    hash_reader(&mut file)
}

/// Compute size, CRC32 and SHA1 of everything `reader` yields.
pub fn hash_reader<R: Read + ?Sized>(reader: &mut R) -> io::Result<FileHashes> {
    let mut crc = crc32fast::Hasher::new();
    let mut sha = sha1::Sha1::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut size_bytes: u64 = 0;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        crc.update(&buf[..n]);
        sha.update(&buf[..n]);
        size_bytes += n as u64;
    }

    Ok(FileHashes {
        size_bytes,
        crc32: format!("{:08x}", crc.finalize()),
        sha1: format!("{:x}", sha.finalize()),
    })
}

/// SHA-256 and byte count of everything `reader` yields.
pub fn sha256_reader<R: Read + ?Sized>(reader: &mut R) -> io::Result<(String, u64)> {
    let mut sha = sha2::Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut size: u64 = 0;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        sha.update(&buf[..n]);
        size += n as u64;
    }

    Ok((format!("{:x}", sha.finalize()), size))
}

#[cfg(test)]
#[path = "tests/hasher_tests.rs"]
mod tests;
