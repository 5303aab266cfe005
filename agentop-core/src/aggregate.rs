//! Aggregation orchestrator
//!
//! [`Aggregator`] owns the set of known agents and the incremental read
//! state for their log files. It re-folds changed files into agent state
//! and publishes immutable [`Snapshot`] values behind an `RwLock<Arc<_>>`:
//! readers always see either the fully-old or fully-new snapshot, and
//! `current_snapshot()` never blocks on aggregation work.
//!
//! [`Monitor`] is the threaded wrapper the binary uses: it starts a
//! [`LogWatcher`], spawns a worker that drains change notifications, and
//! falls back to a timed full re-scan when the channel stays quiet.

use crate::error::Result;
use crate::fold;
use crate::parse::Records;
use crate::pricing::{self, PriceTable, PricingTier};
use crate::tail::LogTailer;
use crate::types::{Agent, AgentStatus, Snapshot, SortKey};
use crate::watch::{self, LogWatcher, WatchEvent};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

/// Incremental state for one log file.
struct FileState {
    tailer: LogTailer,
    /// Fallback id from the file name, used when records carry no agentId.
    file_id: String,
    agent: Option<Agent>,
}

struct Inner {
    files: HashMap<PathBuf, FileState>,
    parse_failures: u64,
}

/// Folds log files into agent state and publishes snapshots.
pub struct Aggregator {
    projects_dir: PathBuf,
    todos_dir: PathBuf,
    table: PriceTable,
    tier: PricingTier,
    inner: Mutex<Inner>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl Aggregator {
    /// `log_dir` is the agent home directory containing `projects/` and
    /// `todos/`.
    pub fn new(log_dir: &Path, table: PriceTable, tier: PricingTier) -> Self {
        Aggregator {
            projects_dir: log_dir.join("projects"),
            todos_dir: log_dir.join("todos"),
            table,
            tier,
            inner: Mutex::new(Inner {
                files: HashMap::new(),
                parse_failures: 0,
            }),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Latest published snapshot. Non-blocking with respect to aggregation;
    /// only the pointer swap is guarded.
    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Sorted agent listing from the current snapshot.
    pub fn agents_sorted(&self, key: SortKey) -> Vec<Agent> {
        let snap = self.current_snapshot();
        snap.agents_sorted(key).into_iter().cloned().collect()
    }

    /// Filtered and sorted agent listing from the current snapshot.
    pub fn agents_filtered(&self, status: Option<AgentStatus>, key: SortKey) -> Vec<Agent> {
        let snap = self.current_snapshot();
        snap.agents_filtered(status, key)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Full re-scan: discover all agent logs, ingest new bytes from each,
    /// drop agents whose files disappeared, publish one snapshot.
    pub fn scan_all(&self) {
        let now = Utc::now();
        let discovered = watch::discover_agent_logs(&self.projects_dir);

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        // A vanished file takes its agent out of the next snapshot.
        inner
            .files
            .retain(|path, _| discovered.binary_search(path).is_ok());

        for path in &discovered {
            self.ingest_file(&mut inner, path, now);
        }

        self.publish(&inner, now);
    }

    /// Ingest one changed file and publish. Non-matching paths are ignored.
    pub fn on_file_changed(&self, path: &Path) {
        if !watch::is_agent_log(path) {
            return;
        }
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        self.ingest_file(&mut inner, path, now);
        self.publish(&inner, now);
    }

    /// Read new bytes from one file and fold them into its agent.
    fn ingest_file(&self, inner: &mut Inner, path: &Path, now: DateTime<Utc>) {
        if !inner.files.contains_key(path) {
            inner.files.insert(
                path.to_path_buf(),
                FileState {
                    tailer: LogTailer::new(path),
                    file_id: watch::agent_file_stem(path)
                        .unwrap_or_else(|| path.to_string_lossy().into_owned()),
                    agent: None,
                },
            );
        }

        let read = inner
            .files
            .get_mut(path)
            .expect("state inserted above")
            .tailer
            .read_new();
        let chunk = match read {
            Ok(chunk) => chunk,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                inner.files.remove(path);
                return;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read log file");
                return;
            }
        };

        let mut records = Vec::new();
        for parsed in Records::new(&chunk.text, chunk.base_offset) {
            match parsed {
                Ok(record) => records.push(record),
                Err(failure) => {
                    inner.parse_failures += 1;
                    tracing::warn!(path = %path.display(), %failure, "Skipping malformed log line");
                }
            }
        }

        let state = inner.files.get_mut(path).expect("state inserted above");
        if chunk.truncated {
            // A shrunken file is a rewrite; rebuild the agent from scratch.
            tracing::info!(path = %path.display(), "Log file shrank, re-reading from start");
            state.agent = None;
        }
        if records.is_empty() {
            return;
        }

        let pending = match state.agent.as_ref() {
            Some(agent) => self.pending_todo(agent),
            None => false,
        };
        let file_id = state.file_id.clone();
        state.agent = fold::fold(state.agent.take(), records, &file_id, pending, now, &self.table);
    }

    /// Re-classify every agent against one `now` and publish a snapshot.
    fn publish(&self, inner: &Inner, now: DateTime<Utc>) {
        let mut agents = BTreeMap::new();
        for state in inner.files.values() {
            if let Some(agent) = &state.agent {
                let mut agent = agent.clone();
                let pending = self.pending_todo(&agent);
                fold::reclassify(&mut agent, pending, now);
                agents.insert(agent.agent_id.clone(), agent);
            }
        }

        let snapshot = Arc::new(Snapshot::build(agents, self.tier, inner.parse_failures));
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = snapshot;
    }

    /// Existence of a todo file for this agent, as a boolean signal only.
    fn pending_todo(&self, agent: &Agent) -> bool {
        let Some(session) = agent.session_id.as_deref() else {
            return false;
        };
        self.todos_dir.join(format!("{session}.json")).exists()
            || self
                .todos_dir
                .join(format!("{}-agent-{}.json", session, agent.agent_id))
                .exists()
    }
}

/// Options for [`Monitor::start`].
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Interval for timed re-scans (and the polling fallback).
    pub refresh_interval: Duration,
    /// Prefer event-driven watching; false forces polling.
    pub watch_enabled: bool,
    /// Skip the remote pricing fetch (cache and bundled rates only).
    pub offline: bool,
    /// Override the pricing cache location; `None` uses the default.
    pub pricing_cache: Option<PathBuf>,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        MonitorOptions {
            refresh_interval: Duration::from_secs(2),
            watch_enabled: true,
            offline: false,
            pricing_cache: None,
        }
    }
}

/// Threaded aggregation service: watcher plus a worker that drains change
/// notifications and performs timed re-scans.
pub struct Monitor {
    aggregator: Arc<Aggregator>,
    tx: Sender<WatchEvent>,
    watcher: Option<LogWatcher>,
    worker: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Resolve pricing, perform an initial full scan, and start the
    /// watcher and worker threads. The first snapshot is published before
    /// this returns.
    pub fn start(log_dir: &Path, options: MonitorOptions) -> Result<Monitor> {
        let cache_path = options
            .pricing_cache
            .clone()
            .unwrap_or_else(pricing::default_cache_path);
        let (table, tier) = pricing::resolve(&cache_path, !options.offline);
        tracing::info!(tier = ?tier, "Price table resolved");

        let aggregator = Arc::new(Aggregator::new(log_dir, table, tier));
        aggregator.scan_all();

        let (tx, rx) = mpsc::channel();
        let watcher = LogWatcher::start(
            aggregator.projects_dir(),
            tx.clone(),
            options.refresh_interval,
            options.watch_enabled,
        );

        let worker_agg = aggregator.clone();
        let interval = options.refresh_interval;
        let worker = std::thread::Builder::new()
            .name("agentop-aggregate".to_string())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Ok(WatchEvent::Changed { path, .. }) => worker_agg.on_file_changed(&path),
                    Ok(WatchEvent::Refresh) | Err(RecvTimeoutError::Timeout) => {
                        worker_agg.scan_all()
                    }
                    Ok(WatchEvent::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(crate::error::Error::Io)?;

        Ok(Monitor {
            aggregator,
            tx,
            watcher: Some(watcher),
            worker: Some(worker),
        })
    }

    /// Latest published snapshot; never blocks on aggregation.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.aggregator.current_snapshot()
    }

    /// Request an immediate full re-scan on the worker thread.
    pub fn refresh_now(&self) {
        let _ = self.tx.send(WatchEvent::Refresh);
    }

    /// Stop the watcher and worker, joining both.
    pub fn stop(mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.stop();
        }
        let _ = self.tx.send(WatchEvent::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
