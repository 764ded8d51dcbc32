/*!
 * Watch Engine (C5): debounced filesystem change notifications.
 *
 * The `notify::recommended_watcher` + `RecursiveMode` + boxed `dyn Watcher`
 * wiring is the same shape as `core/disk_guardian.rs::DiskWatcher`, which
 * watches a single path for disk-space monitoring. This generalizes that to
 * a recursive, debounced event stream: raw `notify` events feed a
 * background thread that coalesces rapid-fire changes per path into a
 * single `WatchEvent` once `debounce_ms` has passed with no further
 * activity, then pushes it onto a bounded ready queue.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use glob::Pattern as GlobPattern;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::WatchConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
    Renamed,
}

#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
    /// Set only for `Renamed` events where `notify` supplied the prior path.
    pub from: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Idle,
    Running,
    Stopped,
}

struct PendingEvent {
    kind: WatchEventKind,
    from: Option<PathBuf>,
    last_update: Instant,
}

/// A running filesystem watch. `Idle` until `start()`, `Running` while the
/// background thread is active, `Stopped` once `stop()` has been called —
/// `start()` cannot be called again on a stopped engine.
pub struct WatchEngine {
    config: WatchConfig,
    state: Mutex<EngineState>,
    ready_rx: Mutex<Option<Receiver<WatchEvent>>>,
    overflowed: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    debounce_thread: Mutex<Option<JoinHandle<()>>>,
}

impl WatchEngine {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            state: Mutex::new(EngineState::Idle),
            ready_rx: Mutex::new(None),
            overflowed: Arc::new(AtomicBool::new(false)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            watcher: Mutex::new(None),
            debounce_thread: Mutex::new(None),
        }
    }

    /// Begin watching. Spawns a `notify` watcher plus a background debounce
    /// thread; returns once both are live.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if *state != EngineState::Idle {
                return Err(Error::watch("watch engine already started"));
            }
            *state = EngineState::Running;
        }

        let (raw_tx, raw_rx) = bounded::<notify::Event>(self.config.queue_cap);
        let (ready_tx, ready_rx) = bounded::<WatchEvent>(self.config.queue_cap);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = raw_tx.send(event);
            }
        })
        .map_err(|e| Error::watch(format!("failed to create filesystem watcher: {e}")))?;

        let mode = if self.config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&self.config.root, mode)
            .map_err(|e| Error::watch(format!("failed to watch {:?}: {e}", self.config.root)))?;

        *self.watcher.lock().unwrap() = Some(watcher);

        let ignore_patterns: Vec<GlobPattern> = self
            .config
            .ignore_patterns
            .iter()
            .filter_map(|p| GlobPattern::new(p).ok())
            .collect();
        let debounce = Duration::from_millis(self.config.debounce_ms);
        let overflowed = self.overflowed.clone();
        let stop_flag = self.stop_flag.clone();

        let handle = std::thread::spawn(move || {
            debounce_loop(raw_rx, ready_tx, debounce, ignore_patterns, overflowed, stop_flag);
        });
        *self.debounce_thread.lock().unwrap() = Some(handle);
        *self.ready_rx.lock().unwrap() = Some(ready_rx);

        Ok(())
    }

    /// Pop debounced events that are ready, waiting up to `timeout_ms` for
    /// at least one. Returns an empty vector on timeout, never blocks
    /// indefinitely.
    pub fn poll_events(&self, timeout_ms: u64) -> Vec<WatchEvent> {
        let guard = self.ready_rx.lock().unwrap();
        let Some(rx) = guard.as_ref() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
            Ok(event) => events.push(event),
            Err(RecvTimeoutError::Timeout) => return events,
            Err(RecvTimeoutError::Disconnected) => return events,
        }
        events.extend(rx.try_iter());
        events
    }

    /// Whether events have been dropped because the ready queue overflowed.
    pub fn overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Acquire)
    }

    /// Stop watching. Idempotent after the first call.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        if *state != EngineState::Running {
            return;
        }
        *state = EngineState::Stopped;
        drop(state);

        self.stop_flag.store(true, Ordering::Release);
        self.watcher.lock().unwrap().take();
        if let Some(handle) = self.debounce_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WatchEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_ignored(path: &Path, patterns: &[GlobPattern]) -> bool {
    let Some(basename) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    patterns.iter().any(|p| p.matches(basename))
}

fn classify(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) => Some(WatchEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Some(WatchEventKind::Renamed),
        EventKind::Modify(_) => Some(WatchEventKind::Modified),
        EventKind::Remove(_) => Some(WatchEventKind::Removed),
        _ => None,
    }
}

fn debounce_loop(
    raw_rx: Receiver<notify::Event>,
    ready_tx: Sender<WatchEvent>,
    debounce: Duration,
    ignore_patterns: Vec<GlobPattern>,
    overflowed: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
) {
    let mut pending: HashMap<PathBuf, PendingEvent> = HashMap::new();
    let tick = Duration::from_millis(10).min(debounce.max(Duration::from_millis(1)));

    loop {
        if stop_flag.load(Ordering::Acquire) {
            break;
        }

        match raw_rx.recv_timeout(tick) {
            Ok(event) => ingest(event, &mut pending, &ignore_patterns),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        flush_ready(&mut pending, debounce, &ready_tx, &overflowed);
    }

    // Final flush: emit anything still pending on shutdown, past debounce or not.
    for (path, event) in pending.drain() {
        let _ = ready_tx.try_send(WatchEvent {
            path,
            kind: event.kind,
            from: event.from,
        });
    }
}

fn ingest(event: notify::Event, pending: &mut HashMap<PathBuf, PendingEvent>, ignore: &[GlobPattern]) {
    let Some(kind) = classify(&event.kind) else {
        return;
    };

    if kind == WatchEventKind::Renamed && event.paths.len() == 2 {
        let from = event.paths[0].clone();
        let to = event.paths[1].clone();
        if is_ignored(&to, ignore) {
            return;
        }
        pending.insert(
            to,
            PendingEvent {
                kind: WatchEventKind::Renamed,
                from: Some(from),
                last_update: Instant::now(),
            },
        );
        return;
    }

    for path in &event.paths {
        if is_ignored(path, ignore) {
            continue;
        }
        coalesce(pending, path.clone(), kind);
    }
}

fn coalesce(pending: &mut HashMap<PathBuf, PendingEvent>, path: PathBuf, kind: WatchEventKind) {
    use std::collections::hash_map::Entry;

    match pending.entry(path) {
        Entry::Occupied(mut slot) => {
            let existing = slot.get().kind;
            match (existing, kind) {
                // create -> modify -> create collapses to the original create.
                (WatchEventKind::Created, WatchEventKind::Modified) => {
                    slot.get_mut().last_update = Instant::now();
                }
                // create -> remove cancels out: nothing ever lands on disk
                // from the watcher's point of view.
                (WatchEventKind::Created, WatchEventKind::Removed) => {
                    slot.remove();
                }
                // remove -> create on the same path within the window reads
                // as an atomic-save style rewrite.
                (WatchEventKind::Removed, WatchEventKind::Created) => {
                    slot.get_mut().kind = WatchEventKind::Modified;
                    slot.get_mut().last_update = Instant::now();
                }
                _ => {
                    slot.get_mut().kind = kind;
                    slot.get_mut().last_update = Instant::now();
                }
            }
        }
        Entry::Vacant(slot) => {
            slot.insert(PendingEvent {
                kind,
                from: None,
                last_update: Instant::now(),
            });
        }
    }
}

fn flush_ready(
    pending: &mut HashMap<PathBuf, PendingEvent>,
    debounce: Duration,
    ready_tx: &Sender<WatchEvent>,
    overflowed: &Arc<AtomicBool>,
) {
    let now = Instant::now();
    let ready_paths: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, event)| now.duration_since(event.last_update) >= debounce)
        .map(|(path, _)| path.clone())
        .collect();

    for path in ready_paths {
        if let Some(event) = pending.remove(&path) {
            let outgoing = WatchEvent {
                path,
                kind: event.kind,
                from: event.from,
            };
            if ready_tx.try_send(outgoing).is_err() {
                overflowed.store(true, Ordering::Release);
            }
        }
    }
}
