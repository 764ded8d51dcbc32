use std::fs;
use std::path::PathBuf;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

use driftwood::{
    copy_files, find_duplicates, hash_file, move_files, walk_collect, Algorithm, CancellationToken,
    CopyOptions, DedupOptions, FileType, FilterConfig, WatchConfig, WatchEngine, WatchEventKind,
};

fn make_tree(root: &std::path::Path, depths: usize, files_per_dir: usize) {
    fn recurse(dir: &std::path::Path, depth_left: usize, files_per_dir: usize) {
        fs::create_dir_all(dir).unwrap();
        for i in 0..files_per_dir {
            fs::write(dir.join(format!("file{i}.txt")), b"x").unwrap();
        }
        if depth_left > 0 {
            recurse(&dir.join("sub"), depth_left - 1, files_per_dir);
        }
    }
    recurse(root, depths - 1, files_per_dir);
}

#[test]
fn scenario_walk_filter() {
    let temp = TempDir::new().unwrap();
    make_tree(temp.path(), 4, 5);

    let all_files = walk_collect(
        temp.path(),
        &FilterConfig {
            file_type: FileType::File,
            ..Default::default()
        },
        false,
    )
    .unwrap();
    assert_eq!(all_files.len(), 20);

    let depth_one = walk_collect(
        temp.path(),
        &FilterConfig {
            file_type: FileType::File,
            max_depth: Some(1),
            ..Default::default()
        },
        false,
    )
    .unwrap();
    assert_eq!(depth_one.len(), 5);

    let txt = walk_collect(
        temp.path(),
        &FilterConfig {
            file_type: FileType::File,
            glob_pattern: Some("*.txt".into()),
            ..Default::default()
        },
        false,
    )
    .unwrap();
    assert_eq!(txt.len(), 20);

    let log = walk_collect(
        temp.path(),
        &FilterConfig {
            file_type: FileType::File,
            glob_pattern: Some("*.log".into()),
            ..Default::default()
        },
        false,
    )
    .unwrap();
    assert_eq!(log.len(), 0);
}

#[test]
fn scenario_hash_known_values() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("greeting.txt");
    file.write_str("hello world").unwrap();

    let blake3 = hash_file(file.path(), Algorithm::Blake3).unwrap();
    assert_eq!(
        blake3.digest,
        "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
    );

    let sha256 = hash_file(file.path(), Algorithm::Sha256).unwrap();
    assert_eq!(
        sha256.digest,
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
}

#[test]
fn scenario_copy_overwrite_refused() {
    let temp = TempDir::new().unwrap();
    let src = temp.child("src.txt");
    src.write_str("new content").unwrap();
    let dest = temp.child("dest.txt");
    dest.write_str("old content").unwrap();

    let result = copy_files(
        &[src.path().to_path_buf()],
        dest.path(),
        &CopyOptions {
            overwrite: false,
            ..Default::default()
        },
        &CancellationToken::new(),
        None,
    );

    let err = result.unwrap_err();
    assert!(err.to_string().contains("overwrite"));
    dest.assert(predicate::str::contains("old content"));
}

#[test]
fn scenario_copy_preserves_bytes_and_move_removes_source() {
    let temp = TempDir::new().unwrap();
    let src = temp.child("a.bin");
    src.write_binary(&[1, 2, 3, 4, 5]).unwrap();
    let copy_dest = temp.child("copy_of_a.bin");

    copy_files(
        &[src.path().to_path_buf()],
        copy_dest.path(),
        &CopyOptions::default(),
        &CancellationToken::new(),
        None,
    )
    .unwrap();
    copy_dest.assert(predicate::path::eq_file(src.path()));
    src.assert(predicate::path::exists());

    let move_dest = temp.child("moved_a.bin");
    move_files(
        &[src.path().to_path_buf()],
        move_dest.path(),
        &CopyOptions::default(),
        &CancellationToken::new(),
        None,
    )
    .unwrap();
    src.assert(predicate::path::missing());
    move_dest.assert(predicate::path::eq_file(copy_dest.path()));
}

#[test]
fn scenario_dedup_three_groups() {
    let temp = TempDir::new().unwrap();
    let x_bytes = vec![b'x'; 10_000];
    let y_bytes = vec![b'y'; 10_000];
    let z_bytes = vec![b'z'; 5_000];

    for name in ["x1.bin", "x2.bin", "x3.bin"] {
        fs::write(temp.path().join(name), &x_bytes).unwrap();
    }
    for name in ["y1.bin", "y2.bin"] {
        fs::write(temp.path().join(name), &y_bytes).unwrap();
    }
    fs::write(temp.path().join("z.bin"), &z_bytes).unwrap();

    let groups = find_duplicates(
        &[temp.path().to_path_buf()],
        &FilterConfig::default(),
        &DedupOptions::default(),
        &CancellationToken::new(),
        None,
    )
    .unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].paths.len(), 3);
    assert_eq!(groups[0].size, 10_000);
    assert_eq!(groups[1].paths.len(), 2);
    assert_eq!(groups[1].size, 10_000);
}

#[test]
fn scenario_watch_creation_is_reported() {
    let temp = TempDir::new().unwrap();
    let mut config = WatchConfig::new(temp.path());
    config.debounce_ms = 100;
    let engine = WatchEngine::new(config);
    engine.start().unwrap();

    fs::write(temp.path().join("created.txt"), b"hi").unwrap();

    let events = engine.poll_events(2000);
    assert!(events.iter().any(|e| {
        e.path.ends_with("created.txt")
            && matches!(e.kind, WatchEventKind::Created | WatchEventKind::Modified)
    }));
    engine.stop();
}

#[test]
fn scenario_watch_ignore_pattern_excludes_matches() {
    let temp = TempDir::new().unwrap();
    let mut config = WatchConfig::new(temp.path());
    config.debounce_ms = 100;
    config.ignore_patterns = vec!["*.tmp".into()];
    let engine = WatchEngine::new(config);
    engine.start().unwrap();

    fs::write(temp.path().join("ignored.tmp"), b"noise").unwrap();
    fs::write(temp.path().join("visible.txt"), b"signal").unwrap();

    let events = engine.poll_events(2000);
    assert!(events.iter().any(|e| e.path.ends_with("visible.txt")));
    assert!(!events.iter().any(|e| e.path.ends_with(".tmp")));
    engine.stop();
}

#[test]
fn cancellation_stops_a_copy_before_it_starts() {
    let temp = TempDir::new().unwrap();
    let src = temp.child("a.txt");
    src.write_str("data").unwrap();
    let dest: PathBuf = temp.path().join("b.txt");

    let token = CancellationToken::new();
    token.cancel();

    let result = copy_files(
        &[src.path().to_path_buf()],
        &dest,
        &CopyOptions::default(),
        &token,
        None,
    );

    assert!(result.is_err());
    assert!(!dest.exists());
}
