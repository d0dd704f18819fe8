//! Content-hash utilities for import deduplication

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Read-buffer size for streaming digests. Files are hashed a few KiB at a
/// time and never loaded into memory whole.
const HASH_BUF_SIZE: usize = 8192;

/// Compute the SHA-256 content hash of a file, hex-encoded.
pub fn hash_file(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    hash_reader(&mut file)
}

/// Compute the SHA-256 hash of any readable source, hex-encoded.
pub fn hash_reader<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_BUF_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
