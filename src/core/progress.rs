/*!
 * Progress snapshots for C4 (copy/move) and C6 (dedup).
 *
 * A caller hands in a plain callback and the engine invokes it directly on
 * a worker thread, rate-limited — simpler than a full publish-subscribe
 * event bus. `ProgressReporter` below is that rate limiter, using a
 * last-emitted-timestamp throttle.
 */

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Snapshot emitted during `copy_files`/`move_files`. Counters are
/// monotonic within one call.
#[derive(Debug, Clone)]
pub struct CopyProgress {
    pub total_files: u64,
    pub files_completed: u64,
    pub total_bytes: u64,
    pub bytes_completed: u64,
    pub current_path: PathBuf,
}

/// Boxed callback invoked on a worker thread with each (rate-limited)
/// `CopyProgress` emission.
pub type CopyProgressCallback = Box<dyn Fn(CopyProgress) + Send + Sync>;

/// Boxed callback invoked by the dedup pipeline with `(stage_name, done, total)`.
pub type DedupProgressCallback = Box<dyn Fn(&str, u64, u64) + Send + Sync>;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

/// Tracks completion counters across a multi-file copy and rate-limits
/// callback invocations to at most one per `PROGRESS_INTERVAL` per file.
pub struct ProgressReporter {
    callback: Option<CopyProgressCallback>,
    total_files: u64,
    total_bytes: u64,
    files_completed: AtomicU64,
    bytes_completed: AtomicU64,
    last_emit: Mutex<Instant>,
}

impl ProgressReporter {
    pub fn new(
        callback: Option<CopyProgressCallback>,
        total_files: u64,
        total_bytes: u64,
    ) -> Self {
        Self {
            callback,
            total_files,
            total_bytes,
            files_completed: AtomicU64::new(0),
            bytes_completed: AtomicU64::new(0),
            last_emit: Mutex::new(Instant::now() - PROGRESS_INTERVAL),
        }
    }

    /// Add `delta` bytes to the running cross-file total and return the new
    /// total. Callers that don't report incrementally (e.g. a reflink copy
    /// that completes a whole file in one step) call this once per file.
    pub fn add_bytes(&self, delta: u64) -> u64 {
        self.bytes_completed.fetch_add(delta, Ordering::AcqRel) + delta
    }

    /// Record `delta` bytes copied for the in-flight file, accumulate them
    /// into the running total, and emit a rate-limited intermediate
    /// snapshot.
    pub fn report_bytes(&self, current_path: &Path, delta: u64) {
        let cumulative = self.add_bytes(delta);
        let Some(cb) = self.callback.as_ref() else {
            return;
        };
        let mut last_emit = self.last_emit.lock().unwrap();
        if last_emit.elapsed() < PROGRESS_INTERVAL {
            return;
        }
        *last_emit = Instant::now();
        drop(last_emit);

        cb(CopyProgress {
            total_files: self.total_files,
            files_completed: self.files_completed.load(Ordering::Acquire),
            total_bytes: self.total_bytes,
            bytes_completed: cumulative,
            current_path: current_path.to_path_buf(),
        });
    }

    /// Mark one file as complete and unconditionally emit (completions are
    /// never throttled away; only the final emission is guaranteed). Does
    /// not add to the byte total itself — callers must account for a file's
    /// bytes exactly once, either via `add_bytes`/`report_bytes` or by
    /// calling `add_bytes` directly before this.
    pub fn complete_file(&self, path: &Path) {
        let completed = self.files_completed.fetch_add(1, Ordering::AcqRel) + 1;
        let cumulative = self.bytes_completed.load(Ordering::Acquire);
        if let Some(cb) = self.callback.as_ref() {
            *self.last_emit.lock().unwrap() = Instant::now();
            cb(CopyProgress {
                total_files: self.total_files,
                files_completed: completed,
                total_bytes: self.total_bytes,
                bytes_completed: cumulative,
                current_path: path.to_path_buf(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn rate_limited_intermediate_reports_are_dropped_when_rapid() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let reporter = ProgressReporter::new(
            Some(Box::new(move |_p| {
                calls2.fetch_add(1, Ordering::SeqCst);
            })),
            1,
            1000,
        );

        for _ in 0..100 {
            reporter.report_bytes(Path::new("/a"), 1);
        }

        assert!(calls.load(Ordering::SeqCst) <= 1);
    }

    #[test]
    fn complete_file_always_emits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let reporter = ProgressReporter::new(
            Some(Box::new(move |_p| {
                calls2.fetch_add(1, Ordering::SeqCst);
            })),
            2,
            2000,
        );

        reporter.add_bytes(1000);
        reporter.complete_file(Path::new("/a"));
        reporter.add_bytes(1000);
        reporter.complete_file(Path::new("/b"));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn bytes_completed_accumulates_across_files() {
        let reporter = ProgressReporter::new(None, 2, 2000);
        reporter.add_bytes(1000);
        reporter.complete_file(Path::new("/a"));
        reporter.add_bytes(1000);
        reporter.complete_file(Path::new("/b"));

        assert_eq!(reporter.bytes_completed.load(Ordering::Acquire), 2000);
    }

    #[test]
    fn no_callback_is_a_safe_noop() {
        let reporter = ProgressReporter::new(None, 1, 100);
        reporter.report_bytes(Path::new("/a"), 10);
        reporter.complete_file(Path::new("/a"));
    }
}
