//! Re-organizes watched directories when new entries appear.

use crate::housekeeper::Housekeeper;
use crate::placement::OrganizeResult;
use crate::summary::SharedStats;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Quiet period after the last relevant event before organizing.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

/// How often the stop flag is checked while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

const PARTIAL_EXTENSIONS: [&str; 5] = [".tmp", ".part", ".crdownload", ".partial", ".download"];

/// Events emitted by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// An entry appeared in a watched directory (created or renamed into it).
    EntryCreated(PathBuf),
    /// The backend reported an error.
    Error(String),
    /// The backend stopped delivering events.
    Disconnected,
}

/// Non-recursive watcher over a set of directories.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    watched_paths: Vec<PathBuf>,
    event_rx: Receiver<notify::Result<Event>>,
}

impl DirectoryWatcher {
    pub fn new() -> OrganizeResult<Self> {
        let (tx, rx) = channel();
        let config = Config::default().with_poll_interval(Duration::from_secs(2));
        let watcher = RecommendedWatcher::new(tx, config)?;

        Ok(Self {
            watcher,
            watched_paths: Vec::new(),
            event_rx: rx,
        })
    }

    /// Starts watching `path`. Returns the canonical path events will carry.
    pub fn watch(&mut self, path: &Path) -> OrganizeResult<PathBuf> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.watcher.watch(&canonical, RecursiveMode::NonRecursive)?;
        info!("watching {}", canonical.display());
        self.watched_paths.push(canonical.clone());
        Ok(canonical)
    }

    /// Waits up to `timeout` for the next relevant event.
    pub fn next_event(&self, timeout: Duration) -> Option<WatchEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(Ok(event)) => convert_event(event),
            Ok(Err(e)) => Some(WatchEvent::Error(e.to_string())),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(WatchEvent::Disconnected),
        }
    }

    /// Releases every subscription.
    pub fn shutdown(&mut self) {
        for path in std::mem::take(&mut self.watched_paths) {
            if let Err(e) = self.watcher.unwatch(&path) {
                debug!("unwatch {} failed: {}", path.display(), e);
            }
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn convert_event(event: Event) -> Option<WatchEvent> {
    let path = match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.first()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.get(1),
        _ => None,
    };
    path.map(|p| WatchEvent::EntryCreated(p.clone()))
}

/// True for entries worth reacting to: not hidden, not a partial download.
pub fn should_process(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    if crate::entry::is_hidden(&name) {
        return false;
    }
    let lower = name.to_lowercase();
    !PARTIAL_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Keeps directories organized until stopped.
pub struct WatchService<'a> {
    housekeeper: &'a Housekeeper,
    stats: &'a SharedStats,
    settle: Duration,
}

impl<'a> WatchService<'a> {
    pub fn new(housekeeper: &'a Housekeeper, stats: &'a SharedStats) -> Self {
        Self {
            housekeeper,
            stats,
            settle: DEFAULT_SETTLE,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Organizes each directory once, then again after every burst of new
    /// entries. Returns when `stop` is set or the watcher disconnects.
    pub fn run(&self, dirs: &[PathBuf], stop: &AtomicBool) -> OrganizeResult<()> {
        let mut watcher = DirectoryWatcher::new()?;
        let mut watched = Vec::with_capacity(dirs.len());
        for dir in dirs {
            watched.push(watcher.watch(dir)?);
        }

        for dir in &watched {
            self.organize(dir);
        }

        let mut dirty = BTreeSet::new();
        let mut deadline: Option<Instant> = None;

        while !stop.load(Ordering::Relaxed) {
            let timeout = deadline
                .map(|d| d.saturating_duration_since(Instant::now()))
                .unwrap_or(POLL_INTERVAL)
                .min(POLL_INTERVAL);

            match watcher.next_event(timeout) {
                Some(WatchEvent::EntryCreated(path)) => {
                    if should_process(&path)
                        && path.is_file()
                        && let Some(parent) = path.parent()
                        && watched.iter().any(|dir| dir == parent)
                    {
                        debug!("new entry {}", path.display());
                        dirty.insert(parent.to_path_buf());
                        deadline = Some(Instant::now() + self.settle);
                    }
                }
                Some(WatchEvent::Error(e)) => warn!("watch error: {}", e),
                Some(WatchEvent::Disconnected) => {
                    warn!("watcher disconnected");
                    break;
                }
                None => {}
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                for dir in std::mem::take(&mut dirty) {
                    self.organize(&dir);
                }
                deadline = None;
            }
        }

        watcher.shutdown();
        Ok(())
    }

    fn organize(&self, dir: &Path) {
        match self.housekeeper.organize(dir) {
            Ok(report) => self.stats.record(&report),
            Err(e) => warn!("{}", e),
        }
    }
}
