/*!
 * Shared process-wide thread pool for C2/C3/C4/C6.
 *
 * One process-wide pool, initialized lazily on first use, rather than a
 * fresh `rayon::ThreadPoolBuilder` pool per call — this builds it once
 * behind a `OnceLock` and every component borrows it. CPU-count detection
 * has a defensive fallback: if `available_parallelism()` fails (restricted
 * containers, cgroups), default to a single thread and log a warning
 * rather than panicking.
 */

use std::sync::OnceLock;

static POOL: OnceLock<rayon::ThreadPool> = OnceLock::new();

pub fn shared_pool() -> &'static rayon::ThreadPool {
    POOL.get_or_init(|| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(detect_parallelism())
            .build()
            .expect("failed to build shared thread pool")
    })
}

fn detect_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or_else(|e| {
            tracing::warn!(
                "failed to detect available parallelism ({}); defaulting to 1 thread",
                e
            );
            1
        })
}
