//! Content hashing: pluggable algorithm dispatch (spec §4.3), generalized from the teacher's
//! fixed-Blake3 `hash_file`/`fill_entry_hash_if_needed` pair (`engine::hashing`).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use memmap2::Mmap;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use sha3::Sha3_256;

use crate::config::HashingConsts;
use crate::error::{EngineError, Result};
use crate::types::HashAlgorithm;

/// Result of hashing one file: raw digest bytes, hex form, and the chunk size used if this was
/// a hybrid partial (movie) hash, so it can be recomputed identically on verification.
pub struct HashOutput {
    pub bytes: Vec<u8>,
    pub hex: String,
    pub partial_chunk_size_mb: Option<i64>,
}

enum AnyHasher {
    Sha1(Sha1),
    Sha256(Sha256),
    Sha3_256(Sha3_256),
}

impl AnyHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => AnyHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => AnyHasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha3_256 => AnyHasher::Sha3_256(Sha3_256::new()),
            HashAlgorithm::SizeName => unreachable!("SizeName never constructs a byte hasher"),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            AnyHasher::Sha1(h) => Digest::update(h, data),
            AnyHasher::Sha256(h) => Digest::update(h, data),
            AnyHasher::Sha3_256(h) => Digest::update(h, data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            AnyHasher::Sha1(h) => h.finalize().to_vec(),
            AnyHasher::Sha256(h) => h.finalize().to_vec(),
            AnyHasher::Sha3_256(h) => h.finalize().to_vec(),
        }
    }
}

/// Feed `file` through `hasher`, mmap'd above the size threshold, chunk-read below it — same
/// split as the teacher's `hash_file`.
fn feed_whole_file(hasher: &mut AnyHasher, file: &File, size: u64, path: &Path) -> Result<()> {
    if size > HashingConsts::HASH_MMAP_THRESHOLD {
        let mmap = unsafe { Mmap::map(file) }.map_err(|e| EngineError::from_io(path, e))?;
        hasher.update(&mmap);
    } else {
        let mut reader =
            std::io::BufReader::with_capacity(HashingConsts::HASH_READ_CHUNK_SIZE, file);
        let mut buffer = vec![0u8; HashingConsts::HASH_READ_CHUNK_SIZE];
        loop {
            let n = reader
                .read(&mut buffer)
                .map_err(|e| EngineError::from_io(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
    }
    Ok(())
}

/// Hash `path` (size `size`) under a plain (non-partial) algorithm.
pub fn hash_file(algorithm: HashAlgorithm, path: &Path, size: u64) -> Result<HashOutput> {
    debug_assert!(algorithm.is_authoritative());
    let file = File::open(path).map_err(|e| EngineError::from_io(path, e))?;
    let mut hasher = AnyHasher::new(algorithm);
    feed_whole_file(&mut hasher, &file, size, path)?;
    let bytes = hasher.finalize();
    let hex = hex::encode(&bytes);
    Ok(HashOutput {
        bytes,
        hex,
        partial_chunk_size_mb: None,
    })
}

/// Hybrid partial hash for movies (spec §3): `size || hash(first N MB) || hash(last N MB)`,
/// recorded with its chunk size so verification can recompute it identically. Files smaller than
/// `2 * chunk_size_mb` hash the whole file instead (the two windows would overlap).
pub fn hash_movie_partial(
    algorithm: HashAlgorithm,
    path: &Path,
    size: u64,
    chunk_size_mb: i64,
) -> Result<HashOutput> {
    debug_assert!(algorithm.is_authoritative());
    let chunk_bytes = (chunk_size_mb.max(1) as u64) * 1024 * 1024;
    if size <= chunk_bytes.saturating_mul(2) {
        let mut out = hash_file(algorithm, path, size)?;
        out.partial_chunk_size_mb = Some(chunk_size_mb);
        return Ok(out);
    }

    let mut file = File::open(path).map_err(|e| EngineError::from_io(path, e))?;
    let mut hasher = AnyHasher::new(algorithm);
    hasher.update(&size.to_le_bytes());

    let mut buffer = vec![0u8; HashingConsts::HASH_READ_CHUNK_SIZE.min(chunk_bytes as usize).max(1)];
    let mut remaining = chunk_bytes;
    while remaining > 0 {
        let want = (buffer.len() as u64).min(remaining) as usize;
        let n = file
            .read(&mut buffer[..want])
            .map_err(|e| EngineError::from_io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        remaining -= n as u64;
    }

    use std::io::{Seek, SeekFrom};
    file.seek(SeekFrom::Start(size - chunk_bytes))
        .map_err(|e| EngineError::from_io(path, e))?;
    let mut remaining = chunk_bytes;
    while remaining > 0 {
        let want = (buffer.len() as u64).min(remaining) as usize;
        let n = file
            .read(&mut buffer[..want])
            .map_err(|e| EngineError::from_io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        remaining -= n as u64;
    }

    let bytes = hasher.finalize();
    let hex = hex::encode(&bytes);
    Ok(HashOutput {
        bytes,
        hex,
        partial_chunk_size_mb: Some(chunk_size_mb),
    })
}

/// "SizeName" preview mode: no content read at all, fingerprint is `size || lowercase(file_name)`.
/// Non-authoritative — callers must not treat a match here as proof of identical content.
pub fn hash_size_name(size: u64, file_name: &str) -> HashOutput {
    let mut bytes = size.to_le_bytes().to_vec();
    bytes.extend_from_slice(file_name.to_lowercase().as_bytes());
    let hex = hex::encode(&bytes);
    HashOutput {
        bytes,
        hex,
        partial_chunk_size_mb: None,
    }
}
