//! Log directory watching
//!
//! Emits change notifications for agent log files into an mpsc channel
//! consumed by the aggregation worker. Two operating modes with the same
//! observable effect ("this file changed, re-read from the last offset"):
//!
//! - **Event-driven**: filesystem events via `notify`, debounced per file
//!   with a 100ms quiescence window, so one append burst yields one
//!   notification without delaying notifications for other files.
//! - **Polling**: stat every matching file on a fixed interval and diff
//!   size/mtime against last-known values.
//!
//! If the event source cannot be created the watcher degrades to polling
//! with a warning; it is never fatal.

use notify::RecommendedWatcher;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

/// Debounce window for event-driven mode.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// Messages consumed by the aggregation worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A matching log file was created or modified.
    Changed { path: PathBuf, size: u64 },
    /// Operator-requested full re-scan.
    Refresh,
    /// Stop the worker; in-flight work completes first.
    Shutdown,
}

/// How the watcher is currently sourcing notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    Events,
    Polling,
}

/// Does this path name an agent log (`agent-*.jsonl`)?
pub fn is_agent_log(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with("agent-") && name.ends_with(".jsonl")
}

/// Agent id embedded in a log file name: `agent-a4767a09.jsonl` → `a4767a09`.
pub fn agent_file_stem(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("agent-").map(|s| s.to_string())
}

/// Background notification source for one projects directory.
///
/// Dropping or calling [`LogWatcher::stop`] stops emission. The watcher
/// never sends [`WatchEvent::Shutdown`]; that is the owner's decision.
pub struct LogWatcher {
    mode: WatchMode,
    _debouncer: Option<Debouncer<RecommendedWatcher>>,
    poll_stop: Arc<AtomicBool>,
    poll_handle: Option<JoinHandle<()>>,
}

impl LogWatcher {
    /// Start watching `projects_dir`, preferring event-driven mode.
    ///
    /// With `events_enabled` false (or when the event source fails to
    /// start), runs the polling loop at `poll_interval` instead.
    pub fn start(
        projects_dir: &Path,
        tx: Sender<WatchEvent>,
        poll_interval: Duration,
        events_enabled: bool,
    ) -> LogWatcher {
        if events_enabled {
            match start_event_source(projects_dir, tx.clone()) {
                Ok(debouncer) => {
                    tracing::info!(dir = %projects_dir.display(), "Watching via filesystem events");
                    return LogWatcher {
                        mode: WatchMode::Events,
                        _debouncer: Some(debouncer),
                        poll_stop: Arc::new(AtomicBool::new(false)),
                        poll_handle: None,
                    };
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Event watch source unavailable, degrading to polling");
                }
            }
        }

        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_poll_loop(projects_dir.to_path_buf(), tx, poll_interval, stop.clone());
        tracing::info!(
            dir = %projects_dir.display(),
            interval_ms = poll_interval.as_millis() as u64,
            "Watching via polling"
        );

        LogWatcher {
            mode: WatchMode::Polling,
            _debouncer: None,
            poll_stop: stop,
            poll_handle: Some(handle),
        }
    }

    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    /// Stop emitting notifications and join the polling thread, if any.
    pub fn stop(mut self) {
        self.poll_stop.store(true, Ordering::Relaxed);
        self._debouncer = None;
        if let Some(handle) = self.poll_handle.take() {
            let _ = handle.join();
        }
    }
}

fn start_event_source(
    projects_dir: &Path,
    tx: Sender<WatchEvent>,
) -> notify::Result<Debouncer<RecommendedWatcher>> {
    let mut debouncer = new_debouncer(DEBOUNCE_WINDOW, move |res: DebounceEventResult| match res {
        Ok(events) => {
            for event in events {
                if !is_agent_log(&event.path) {
                    continue;
                }
                // Size hint from a fresh stat; a vanished file is simply
                // dropped here and reconciled by the next full scan.
                let Ok(meta) = std::fs::metadata(&event.path) else {
                    continue;
                };
                let _ = tx.send(WatchEvent::Changed {
                    path: event.path,
                    size: meta.len(),
                });
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Watch event error");
        }
    })?;

    debouncer
        .watcher()
        .watch(projects_dir, notify::RecursiveMode::Recursive)?;

    Ok(debouncer)
}

fn spawn_poll_loop(
    projects_dir: PathBuf,
    tx: Sender<WatchEvent>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut known: HashMap<PathBuf, (u64, SystemTime)> = HashMap::new();

        while !stop.load(Ordering::Relaxed) {
            for path in discover_agent_logs(&projects_dir) {
                let Ok(meta) = std::fs::metadata(&path) else {
                    continue;
                };
                let size = meta.len();
                let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

                let changed = match known.get(&path) {
                    Some(&(known_size, known_mtime)) => size != known_size || mtime != known_mtime,
                    None => true,
                };
                if changed {
                    known.insert(path.clone(), (size, mtime));
                    if tx.send(WatchEvent::Changed { path, size }).is_err() {
                        return;
                    }
                }
            }

            // Sleep in short slices so stop() returns promptly.
            let mut remaining = interval;
            while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
                let slice = remaining.min(Duration::from_millis(50));
                std::thread::sleep(slice);
                remaining = remaining.saturating_sub(slice);
            }
        }
    })
}

/// All agent log files under a projects directory, in sorted order.
pub fn discover_agent_logs(projects_dir: &Path) -> Vec<PathBuf> {
    let pattern = projects_dir.join("**").join("agent-*.jsonl");
    let pattern_str = pattern.to_string_lossy();

    let entries = match glob::glob(&pattern_str) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(pattern = %pattern_str, error = %e, "Invalid glob pattern");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries.flatten().filter(|p| is_agent_log(p)).collect();
    files.sort();
    files
}
