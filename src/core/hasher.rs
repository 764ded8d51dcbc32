/*!
 * Content Hasher (C3): single- and multi-file digests with BLAKE3 or
 * SHA-256.
 *
 * The chunked read loop and streaming-digest shape generalize a
 * `StreamingHasher`/`calculate_checksum` idiom from hard-coded SHA-256 to
 * both algorithms. Files above the memory-map threshold are hashed through
 * `memmap2` instead of buffered reads; multi-file dispatch runs each path
 * on the shared pool via `rayon`'s parallel iterators and restores input
 * order by index, since `rayon`'s `par_iter().enumerate()` does not
 * preserve completion order on its own.
 */

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::cancellation::CancellationToken;
use crate::config::Algorithm;
use crate::core::progress::DedupProgressCallback;
use crate::error::{Error, Result};

use super::pool::shared_pool;

const CHUNK_SIZE: usize = 1024 * 1024; // 1 MiB
const MMAP_THRESHOLD: u64 = 8 * 1024 * 1024; // 8 MiB

/// Maps a missing file to the dedicated `NotFound` kind so callers can
/// distinguish it from other hashing failures; anything else falls back to
/// the generic hash error.
fn open_error(path: &Path, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::not_found(path)
    } else {
        Error::hash(path, e.to_string())
    }
}

/// Digest of a single file, tagged with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashResult {
    pub path: PathBuf,
    pub algorithm: Algorithm,
    pub digest: String,
}

enum StreamingDigest {
    Blake3(blake3::Hasher),
    Sha256(sha2::Sha256),
}

impl StreamingDigest {
    fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Blake3 => StreamingDigest::Blake3(blake3::Hasher::new()),
            Algorithm::Sha256 => StreamingDigest::Sha256(sha2::Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            StreamingDigest::Blake3(h) => {
                h.update(data);
            }
            StreamingDigest::Sha256(h) => {
                use sha2::Digest;
                h.update(data);
            }
        }
    }

    fn finalize(self) -> String {
        match self {
            StreamingDigest::Blake3(h) => h.finalize().to_hex().to_string(),
            StreamingDigest::Sha256(h) => {
                use sha2::Digest;
                hex::encode(h.finalize())
            }
        }
    }
}

/// Hash a single file, choosing a buffered read or a memory map depending
/// on its size.
pub fn hash_file(path: &Path, algorithm: Algorithm) -> Result<HashResult> {
    let file = File::open(path).map_err(|e| open_error(path, e))?;
    let meta = file
        .metadata()
        .map_err(|e| Error::hash(path, e.to_string()))?;

    let digest = if meta.len() >= MMAP_THRESHOLD {
        hash_via_mmap(&file, path, algorithm)?
    } else {
        hash_via_buffer(file, path, algorithm)?
    };

    Ok(HashResult {
        path: path.to_path_buf(),
        algorithm,
        digest,
    })
}

fn hash_via_buffer(mut file: File, path: &Path, algorithm: Algorithm) -> Result<String> {
    let mut digest = StreamingDigest::new(algorithm);
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buffer)
            .map_err(|e| Error::hash(path, e.to_string()))?;
        if n == 0 {
            break;
        }
        digest.update(&buffer[..n]);
    }
    Ok(digest.finalize())
}

fn hash_via_mmap(file: &File, path: &Path, algorithm: Algorithm) -> Result<String> {
    // SAFETY: the mapping is read-only and the file is not concurrently
    // truncated by this process; external mutation during the hash is a
    // known, accepted race for any mmap-based hashing scheme.
    let mmap = unsafe { memmap2::Mmap::map(file) }.map_err(|e| Error::hash(path, e.to_string()))?;
    let mut digest = StreamingDigest::new(algorithm);
    for chunk in mmap.chunks(CHUNK_SIZE) {
        digest.update(chunk);
    }
    Ok(digest.finalize())
}

/// Read only the first `len` bytes (or the whole file, if smaller) and hash
/// that prefix. Used by the dedup pipeline's cheap partial-match stage.
pub fn hash_prefix(path: &Path, algorithm: Algorithm, len: usize) -> Result<HashResult> {
    let mut file = File::open(path).map_err(|e| open_error(path, e))?;
    let mut digest = StreamingDigest::new(algorithm);
    let mut buffer = vec![0u8; len];
    let mut remaining = len;
    let mut offset = 0;
    while remaining > 0 {
        let n = file
            .read(&mut buffer[offset..len])
            .map_err(|e| Error::hash(path, e.to_string()))?;
        if n == 0 {
            break;
        }
        offset += n;
        remaining -= n;
    }
    digest.update(&buffer[..offset]);
    Ok(HashResult {
        path: path.to_path_buf(),
        algorithm,
        digest: digest.finalize(),
    })
}

/// Hash many files in parallel on the shared pool, preserving the input
/// order in the returned vector regardless of completion order.
pub fn hash_files(
    paths: &[PathBuf],
    algorithm: Algorithm,
    cancellation: &CancellationToken,
    progress: Option<&DedupProgressCallback>,
) -> Vec<Result<HashResult>> {
    let total = paths.len() as u64;
    let done = std::sync::atomic::AtomicU64::new(0);

    shared_pool().install(|| {
        paths
            .par_iter()
            .map(|path| {
                let result = cancellation.check().and_then(|_| hash_file(path, algorithm));
                let completed = done.fetch_add(1, std::sync::atomic::Ordering::AcqRel) + 1;
                if let Some(cb) = progress {
                    cb("hash", completed, total);
                }
                result
            })
            .collect()
    })
}
