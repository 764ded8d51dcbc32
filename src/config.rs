/*!
 * Per-call configuration records.
 *
 * Every public operation takes one of these as a plain struct with a
 * `Default` impl. There is no file-based configuration layer: the toolkit
 * holds no persisted state across calls, so there is nothing to load.
 */

use std::path::PathBuf;

/// Restricts which entries a walk or watch considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    #[default]
    Any,
    File,
    Dir,
}

/// Hash algorithm selectable per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    Blake3,
    Sha256,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Blake3 => "blake3",
            Algorithm::Sha256 => "sha256",
        }
    }
}

/// Configuration for C1/C2: path filtering during a walk.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub file_type: FileType,
    /// `None` means unbounded depth.
    pub max_depth: Option<usize>,
    /// UNIX-shell glob. Matches the basename unless it contains `/`, in
    /// which case it matches the path relative to the walk root.
    pub glob_pattern: Option<String>,
    pub follow_symlinks: bool,
    /// Globs matched against each entry's basename; a match excludes it.
    pub ignore_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            file_type: FileType::Any,
            max_depth: None,
            glob_pattern: None,
            follow_symlinks: false,
            ignore_patterns: Vec::new(),
        }
    }
}

/// Options for `walk_collect`.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub filter: FilterConfig,
    pub sort: bool,
}

/// Options shared by `copy_files`/`move_files`.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub overwrite: bool,
    /// Files at or above this size attempt a reflink/CoW copy before
    /// falling back to chunked I/O.
    pub reflink_threshold: u64,
    /// Buffer size for chunked (non-reflink) copy.
    pub chunk_size: usize,
    pub preserve_metadata: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            reflink_threshold: 1024 * 1024,
            chunk_size: 1024 * 1024,
            preserve_metadata: true,
        }
    }
}

/// Configuration for C5: one watch session.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub root: PathBuf,
    pub recursive: bool,
    pub debounce_ms: u64,
    pub ignore_patterns: Vec<String>,
    /// Capacity of the ready queue before oldest events are dropped.
    pub queue_cap: usize,
}

impl WatchConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
            debounce_ms: 100,
            ignore_patterns: Vec::new(),
            queue_cap: 10_000,
        }
    }
}

/// Options for `find_duplicates`.
#[derive(Debug, Clone)]
pub struct DedupOptions {
    pub algorithm: Algorithm,
    pub min_size: u64,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Blake3,
            min_size: 1,
        }
    }
}
