/*!
 * driftwood - parallel filesystem toolkit
 *
 * Provides:
 * - Parallel recursive traversal with depth/type/glob filtering (C2, C1)
 * - Content hashing with BLAKE3 or SHA-256 (C3)
 * - Bulk copy/move with reflink fast paths and progress reporting (C4)
 * - Debounced filesystem change watching (C5)
 * - Staged duplicate detection (C6)
 */

pub mod cancellation;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use cancellation::CancellationToken;
pub use config::{Algorithm, CopyOptions, DedupOptions, FileType, FilterConfig, WalkOptions, WatchConfig};
pub use core::copy::{copy_files, move_files, CopySummary};
pub use core::dedup::{find_duplicates, DuplicateGroup};
pub use core::filter::{EntryFilter, FilterError};
pub use core::hasher::{hash_file, hash_files, hash_prefix, HashResult};
pub use core::progress::{CopyProgress, CopyProgressCallback, DedupProgressCallback};
pub use core::walker::{walk, walk_collect, WalkEntry, WalkErrorEvent, WalkHandle};
pub use core::watch::{WatchEngine, WatchEvent, WatchEventKind};
pub use error::{Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_populated() {
        assert!(!VERSION.is_empty());
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn walk_hash_and_dedup_compose_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"same").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"same").unwrap();

        let entries = walk_collect(dir.path(), &FilterConfig::default(), true).unwrap();
        assert_eq!(entries.iter().filter(|e| e.is_file).count(), 2);

        let groups = find_duplicates(
            &[dir.path().to_path_buf()],
            &FilterConfig::default(),
            &DedupOptions::default(),
            &CancellationToken::new(),
            None,
        )
        .unwrap();
        assert_eq!(groups.len(), 1);
    }
}
