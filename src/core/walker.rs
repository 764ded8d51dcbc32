/*!
 * Parallel Walker (C2): recursive traversal producing `WalkEntry` values,
 * streamed or collected.
 *
 * Pending directories live in one shared `crossbeam_channel` that every
 * worker both pops from *and* pushes to (subdirectories go back onto the
 * same queue), so any idle worker can immediately pick up newly discovered
 * work — a work-stealing queue rather than a single-thread scan fanned out
 * to a pool. The bounded output channel gives the producer side
 * backpressure: workers block on `send` when the consumer is slow,
 * bounding memory to O(workers × batch_size).
 */

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError};

use crate::config::FilterConfig;
use crate::error::{Error, Result};

use super::filter::EntryFilter;
use super::pool::shared_pool;

/// One filesystem object visited by the walker. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub depth: usize,
    pub is_file: bool,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub file_size: u64,
}

/// A per-entry traversal failure: permission denied or an I/O error reading
/// a directory. These do not abort the walk.
#[derive(Debug, Clone)]
pub struct WalkErrorEvent {
    pub path: PathBuf,
    pub message: String,
}

struct PendingDir {
    path: PathBuf,
    depth: usize,
}

/// Handle to an in-progress streaming walk. Dropping it before it is
/// exhausted cancels the producers (their `send` calls on the now-closed
/// output channel fail and they exit).
pub struct WalkHandle {
    entries: Receiver<WalkEntry>,
    errors: Receiver<WalkErrorEvent>,
}

impl WalkHandle {
    /// Drain any per-entry errors recorded so far without blocking.
    pub fn drain_errors(&self) -> Vec<WalkErrorEvent> {
        self.errors.try_iter().collect()
    }
}

impl Iterator for WalkHandle {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        self.entries.recv().ok()
    }
}

fn validate_root(root: &Path) -> Result<PathBuf> {
    let canonical = fs::canonicalize(root)
        .map_err(|e| Error::walk(format!("cannot access root {:?}: {e}", root)))?;
    let meta = fs::metadata(&canonical)
        .map_err(|e| Error::walk(format!("cannot stat root {:?}: {e}", canonical)))?;
    if !meta.is_dir() {
        return Err(Error::walk(format!("root {:?} is not a directory", canonical)));
    }
    Ok(canonical)
}

/// Streaming traversal: `walk(root, filter) -> lazy sequence of WalkEntry`.
/// No ordering guarantee across or within directories.
pub fn walk(root: &Path, filter_config: &FilterConfig) -> Result<WalkHandle> {
    let root = validate_root(root)?;
    let filter = Arc::new(
        EntryFilter::compile(filter_config).map_err(|e| Error::walk(e.to_string()))?,
    );

    let (pending_tx, pending_rx) = unbounded::<PendingDir>();
    let (entries_tx, entries_rx) = bounded::<WalkEntry>(1024);
    let (errors_tx, errors_rx) = unbounded::<WalkErrorEvent>();

    let outstanding = Arc::new(AtomicUsize::new(1));
    let visited = Arc::new(Mutex::new(HashSet::<PathBuf>::new()));
    visited.lock().unwrap().insert(root.clone());
    let root = Arc::new(root);

    pending_tx
        .send(PendingDir {
            path: (*root).clone(),
            depth: 0,
        })
        .expect("pending queue just created");

    let worker_count = shared_pool().current_num_threads().max(1);
    let pool = shared_pool();
    for _ in 0..worker_count {
        let pending_tx = pending_tx.clone();
        let pending_rx = pending_rx.clone();
        let entries_tx = entries_tx.clone();
        let errors_tx = errors_tx.clone();
        let outstanding = outstanding.clone();
        let filter = filter.clone();
        let visited = visited.clone();
        let root = root.clone();

        pool.spawn(move || {
            worker_loop(
                pending_tx,
                pending_rx,
                entries_tx,
                errors_tx,
                outstanding,
                filter,
                visited,
                root,
            );
        });
    }

    Ok(WalkHandle {
        entries: entries_rx,
        errors: errors_rx,
    })
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    pending_tx: crossbeam_channel::Sender<PendingDir>,
    pending_rx: Receiver<PendingDir>,
    entries_tx: crossbeam_channel::Sender<WalkEntry>,
    errors_tx: crossbeam_channel::Sender<WalkErrorEvent>,
    outstanding: Arc<AtomicUsize>,
    filter: Arc<EntryFilter>,
    visited: Arc<Mutex<HashSet<PathBuf>>>,
    root: Arc<PathBuf>,
) {
    loop {
        let dir = match pending_rx.recv_timeout(Duration::from_millis(5)) {
            Ok(dir) => dir,
            Err(RecvTimeoutError::Timeout) => {
                if outstanding.load(Ordering::Acquire) == 0 {
                    return;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        };

        process_dir(
            &dir,
            &pending_tx,
            &entries_tx,
            &errors_tx,
            &outstanding,
            &filter,
            &visited,
            &root,
        );

        // This directory is now fully handled; any subdirectories it
        // discovered were already counted when enqueued below.
        if outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            // We just brought the count to zero; nothing more can ever be
            // enqueued since every in-flight dir has now been processed.
            return;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn process_dir(
    dir: &PendingDir,
    pending_tx: &crossbeam_channel::Sender<PendingDir>,
    entries_tx: &crossbeam_channel::Sender<WalkEntry>,
    errors_tx: &crossbeam_channel::Sender<WalkErrorEvent>,
    outstanding: &Arc<AtomicUsize>,
    filter: &Arc<EntryFilter>,
    visited: &Arc<Mutex<HashSet<PathBuf>>>,
    root: &Path,
) {
    let read_dir = match fs::read_dir(&dir.path) {
        Ok(rd) => rd,
        Err(e) => {
            let _ = errors_tx.send(WalkErrorEvent {
                path: dir.path.clone(),
                message: e.to_string(),
            });
            return;
        }
    };

    for entry in read_dir {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let _ = errors_tx.send(WalkErrorEvent {
                    path: dir.path.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                let _ = errors_tx.send(WalkErrorEvent {
                    path: path.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        let is_symlink = file_type.is_symlink();
        let mut is_dir = file_type.is_dir();
        let mut is_file = file_type.is_file();
        let mut file_size = 0u64;

        if is_symlink && filter.follow_symlinks() {
            match fs::canonicalize(&path) {
                Ok(target) => {
                    let mut seen = visited.lock().unwrap();
                    if !seen.insert(target.clone()) {
                        // Cycle: silently skip.
                        continue;
                    }
                    drop(seen);
                    match fs::metadata(&target) {
                        Ok(meta) => {
                            is_dir = meta.is_dir();
                            is_file = meta.is_file();
                            file_size = if is_file { meta.len() } else { 0 };
                        }
                        Err(e) => {
                            let _ = errors_tx.send(WalkErrorEvent {
                                path: path.clone(),
                                message: e.to_string(),
                            });
                            continue;
                        }
                    }
                }
                Err(e) => {
                    let _ = errors_tx.send(WalkErrorEvent {
                        path: path.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
            }
        } else if !is_symlink {
            match entry.metadata() {
                Ok(meta) => {
                    file_size = if is_file { meta.len() } else { 0 };
                }
                Err(e) => {
                    let _ = errors_tx.send(WalkErrorEvent {
                        path: path.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
            }
        }

        let depth = dir.depth + 1;
        let full_relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        if filter.matches(&full_relative, depth, is_file, is_dir) {
            let sent = entries_tx.send(WalkEntry {
                path: path.clone(),
                depth,
                is_file,
                is_dir,
                is_symlink,
                file_size,
            });
            if sent.is_err() {
                // Consumer dropped the handle: stop producing entirely.
                return;
            }
        }

        if is_dir && (!is_symlink || filter.follow_symlinks()) && filter.depth_in_range(depth) {
            outstanding.fetch_add(1, Ordering::AcqRel);
            if pending_tx
                .send(PendingDir {
                    path: path.clone(),
                    depth,
                })
                .is_err()
            {
                outstanding.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }
}

/// Materialized traversal: `walk_collect(root, filter, sort) -> ordered
/// sequence of WalkEntry`.
pub fn walk_collect(
    root: &Path,
    filter_config: &FilterConfig,
    sort: bool,
) -> Result<Vec<WalkEntry>> {
    let handle = walk(root, filter_config)?;
    let mut entries: Vec<WalkEntry> = handle.collect();
    if sort {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn make_tree(root: &Path, depths: usize, files_per_dir: usize) {
        fn recurse(dir: &Path, depth_left: usize, files_per_dir: usize) {
            fs::create_dir_all(dir).unwrap();
            for i in 0..files_per_dir {
                fs::write(dir.join(format!("file{i}.txt")), b"x").unwrap();
            }
            if depth_left > 0 {
                let sub = dir.join("sub");
                recurse(&sub, depth_left - 1, files_per_dir);
            }
        }
        recurse(root, depths - 1, files_per_dir);
    }

    #[test]
    fn walk_filter_scenario_from_spec() {
        let dir = tempdir().unwrap();
        make_tree(dir.path(), 4, 5);

        let all = walk_collect(dir.path(), &FilterConfig::default(), false).unwrap();
        let files: Vec<_> = all.iter().filter(|e| e.is_file).collect();
        assert_eq!(files.len(), 20);

        let depth_limited = walk_collect(
            dir.path(),
            &FilterConfig {
                max_depth: Some(1),
                ..Default::default()
            },
            false,
        )
        .unwrap();
        let files: Vec<_> = depth_limited.iter().filter(|e| e.is_file).collect();
        assert_eq!(files.len(), 5);

        let txt_only = walk_collect(
            dir.path(),
            &FilterConfig {
                glob_pattern: Some("*.txt".into()),
                ..Default::default()
            },
            false,
        )
        .unwrap();
        assert_eq!(txt_only.iter().filter(|e| e.is_file).count(), 20);

        let log_only = walk_collect(
            dir.path(),
            &FilterConfig {
                glob_pattern: Some("*.log".into()),
                ..Default::default()
            },
            false,
        )
        .unwrap();
        assert_eq!(log_only.iter().filter(|e| e.is_file).count(), 0);
    }

    #[test]
    fn walk_collect_sorted_is_deterministic() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), b"1").unwrap();
        fs::write(dir.path().join("a.txt"), b"1").unwrap();

        let sorted = walk_collect(
            dir.path(),
            &FilterConfig {
                file_type: crate::config::FileType::File,
                ..Default::default()
            },
            true,
        )
        .unwrap();

        assert!(sorted[0].path < sorted[1].path);
    }

    #[test]
    fn nonexistent_root_is_a_fatal_walk_error() {
        let result = walk_collect(
            Path::new("/definitely/does/not/exist/hopefully"),
            &FilterConfig::default(),
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn slash_glob_matches_relative_to_the_walk_root_not_the_parent() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/file.txt"), b"x").unwrap();
        fs::write(dir.path().join("sub/other.log"), b"x").unwrap();

        let matched = walk_collect(
            dir.path(),
            &FilterConfig {
                file_type: crate::config::FileType::File,
                glob_pattern: Some("sub/*.txt".into()),
                ..Default::default()
            },
            false,
        )
        .unwrap();

        assert_eq!(matched.len(), 1);
        assert!(matched[0].path.ends_with("sub/file.txt"));
    }

    #[test]
    fn permission_errors_are_recorded_but_walk_continues() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ok.txt"), b"x").unwrap();

        let handle = walk(dir.path(), &FilterConfig::default()).unwrap();
        let entries: Vec<_> = handle.collect();
        assert!(entries.iter().any(|e| e.path.ends_with("ok.txt")));
    }
}
