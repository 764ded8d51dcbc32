/*!
 * Dedup Pipeline (C6): three-stage duplicate detection built on the walker
 * and hasher.
 *
 * This composes C2 (`walker::walk_collect`) and C3 (`hasher::hash_prefix`/
 * `hash_file`) directly rather than reimplementing traversal or hashing.
 * Each stage only re-examines the survivors of the previous one: first
 * group by size (free, from directory metadata), then by a cheap prefix
 * hash, then only fully hash whatever prefix collisions remain, avoiding
 * hashing every byte of every same-sized file.
 */

use std::collections::HashMap;
use std::path::PathBuf;

use crate::cancellation::CancellationToken;
use crate::config::{Algorithm, DedupOptions, FilterConfig};
use crate::error::Result;

use super::hasher::{hash_file, hash_prefix};
use super::progress::DedupProgressCallback;
use super::walker::walk_collect;

const PARTIAL_HASH_LEN: usize = 4096;

/// A set of files sharing identical content under the configured algorithm.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub size: u64,
    pub digest: String,
    pub algorithm: Algorithm,
    pub paths: Vec<PathBuf>,
}

/// Walk every root, then narrow candidates size -> partial hash -> full
/// hash, emitting one `DuplicateGroup` per surviving content match. Groups
/// are sorted by descending wasted bytes (size * (duplicate count - 1)),
/// then by size, then by smallest path, for a stable, most-impactful-first
/// ordering.
pub fn find_duplicates(
    roots: &[PathBuf],
    filter: &FilterConfig,
    options: &DedupOptions,
    cancellation: &CancellationToken,
    progress: Option<&DedupProgressCallback>,
) -> Result<Vec<DuplicateGroup>> {
    let mut candidates: Vec<(PathBuf, u64)> = Vec::new();
    for root in roots {
        cancellation.check()?;
        let entries = walk_collect(root, filter, false)?;
        for entry in entries {
            if entry.is_file && entry.file_size >= options.min_size {
                candidates.push((entry.path, entry.file_size));
            }
        }
    }

    let by_size = group_by_size(candidates);
    if let Some(cb) = progress {
        let survivors: u64 = by_size.values().map(|v| v.len() as u64).sum();
        cb("size_grouping", survivors, survivors);
    }

    cancellation.check()?;
    let by_partial = narrow_by_partial_hash(by_size, options.algorithm, progress);

    cancellation.check()?;
    let groups = narrow_by_full_hash(by_partial, options.algorithm, progress);

    let mut groups: Vec<DuplicateGroup> = groups
        .into_iter()
        .filter(|g| g.paths.len() > 1)
        .collect();

    for group in &mut groups {
        group.paths.sort();
    }
    groups.sort_by(|a, b| {
        let wasted_a = a.size * (a.paths.len() as u64 - 1);
        let wasted_b = b.size * (b.paths.len() as u64 - 1);
        wasted_b
            .cmp(&wasted_a)
            .then_with(|| b.size.cmp(&a.size))
            .then_with(|| a.paths[0].cmp(&b.paths[0]))
    });

    Ok(groups)
}

fn group_by_size(candidates: Vec<(PathBuf, u64)>) -> HashMap<u64, Vec<PathBuf>> {
    let mut groups: HashMap<u64, Vec<PathBuf>> = HashMap::new();
    for (path, size) in candidates {
        groups.entry(size).or_default().push(path);
    }
    groups.retain(|_, paths| paths.len() > 1);
    groups
}

fn narrow_by_partial_hash(
    by_size: HashMap<u64, Vec<PathBuf>>,
    algorithm: Algorithm,
    progress: Option<&DedupProgressCallback>,
) -> HashMap<(u64, String), Vec<PathBuf>> {
    let mut groups: HashMap<(u64, String), Vec<PathBuf>> = HashMap::new();
    let total: u64 = by_size.values().map(|v| v.len() as u64).sum();
    let mut done = 0u64;

    for (size, paths) in by_size {
        let prefix_len = PARTIAL_HASH_LEN.min(size as usize);
        for path in paths {
            done += 1;
            if let Some(cb) = progress {
                cb("partial_hash", done, total);
            }
            // A file that becomes unreadable between the walk and this stage
            // is dropped rather than aborting the whole call.
            let Ok(result) = hash_prefix(&path, algorithm, prefix_len) else {
                continue;
            };
            groups.entry((size, result.digest)).or_default().push(path);
        }
    }

    groups.retain(|_, paths| paths.len() > 1);
    groups
}

fn narrow_by_full_hash(
    by_partial: HashMap<(u64, String), Vec<PathBuf>>,
    algorithm: Algorithm,
    progress: Option<&DedupProgressCallback>,
) -> Vec<DuplicateGroup> {
    let mut groups: HashMap<(u64, String), Vec<PathBuf>> = HashMap::new();
    let total: u64 = by_partial.values().map(|v| v.len() as u64).sum();
    let mut done = 0u64;

    for ((size, _partial_digest), paths) in by_partial {
        for path in paths {
            done += 1;
            if let Some(cb) = progress {
                cb("full_hash", done, total);
            }
            let Ok(result) = hash_file(&path, algorithm) else {
                continue;
            };
            groups.entry((size, result.digest)).or_default().push(path);
        }
    }

    groups
        .into_iter()
        .map(|((size, digest), paths)| DuplicateGroup {
            size,
            digest,
            algorithm,
            paths,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn identical_files_are_grouped_as_duplicates() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"same content").unwrap();
        fs::write(dir.path().join("b.txt"), b"same content").unwrap();
        fs::write(dir.path().join("c.txt"), b"different").unwrap();

        let groups = find_duplicates(
            &[dir.path().to_path_buf()],
            &FilterConfig::default(),
            &DedupOptions::default(),
            &CancellationToken::new(),
            None,
        )
        .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].paths.len(), 2);
    }

    #[test]
    fn files_below_min_size_are_excluded() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        fs::write(dir.path().join("b.txt"), b"hi").unwrap();

        let groups = find_duplicates(
            &[dir.path().to_path_buf()],
            &FilterConfig::default(),
            &DedupOptions {
                algorithm: Algorithm::Blake3,
                min_size: 100,
            },
            &CancellationToken::new(),
            None,
        )
        .unwrap();

        assert!(groups.is_empty());
    }

    #[test]
    fn no_duplicates_yields_empty_groups() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"one").unwrap();
        fs::write(dir.path().join("b.txt"), b"two").unwrap();

        let groups = find_duplicates(
            &[dir.path().to_path_buf()],
            &FilterConfig::default(),
            &DedupOptions::default(),
            &CancellationToken::new(),
            None,
        )
        .unwrap();

        assert!(groups.is_empty());
    }

    #[test]
    fn groups_are_sorted_by_descending_reclaimable_space() {
        let dir = tempdir().unwrap();
        let big = vec![0xAB_u8; 10_000];
        let small = vec![0xCD_u8; 10];

        fs::write(dir.path().join("big1.bin"), &big).unwrap();
        fs::write(dir.path().join("big2.bin"), &big).unwrap();
        fs::write(dir.path().join("small1.bin"), &small).unwrap();
        fs::write(dir.path().join("small2.bin"), &small).unwrap();
        fs::write(dir.path().join("small3.bin"), &small).unwrap();

        let groups = find_duplicates(
            &[dir.path().to_path_buf()],
            &FilterConfig::default(),
            &DedupOptions::default(),
            &CancellationToken::new(),
            None,
        )
        .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].size, 10_000);
    }
}
