//! DataFileWatcher - re-imports data files when they change on disk
//!
//! Watches the parent directory of every tracked data file (editors often
//! replace files instead of writing in place), keeps only events for tracked
//! files, and waits for a quiet period before asking the loader to re-read a
//! file. The resulting import pass sweeps out deleted lines.

use notify::event::ModifyKind;
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};

/// Poll interval of the event processor
const TICK: Duration = Duration::from_millis(50);

/// Configuration for the data file watcher
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Data files to watch (canonical paths, as registered with the loader)
    pub files: Vec<PathBuf>,

    /// Quiet period after the last event before a file is reloaded
    pub debounce_duration: Duration,
}

impl WatchConfig {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            debounce_duration: Duration::from_millis(100),
        }
    }
}

/// Trailing-edge debouncer: a path is ready once it stayed quiet for `window`
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn touch(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now);
    }

    /// Paths quiet for at least the window; they are forgotten once returned
    pub fn ready(&mut self, now: Instant) -> Vec<PathBuf> {
        let window = self.window;
        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, last_seen)| now.duration_since(**last_seen) >= window)
            .map(|(path, _)| path.clone())
            .collect();
        ready.sort();
        for path in &ready {
            self.pending.remove(path);
        }
        ready
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Watches data files and sends changed paths to the loader
pub struct DataFileWatcher {
    config: WatchConfig,
    reload: Sender<PathBuf>,
    watcher: Option<RecommendedWatcher>,
    processor_thread: Option<thread::JoinHandle<()>>,
    running: Arc<Mutex<bool>>,
}

impl DataFileWatcher {
    /// Create a watcher that sends reload requests to `reload`
    ///
    /// # Errors
    /// Returns error if no file is configured or a file has no parent directory
    pub fn new(config: WatchConfig, reload: Sender<PathBuf>) -> Result<Self> {
        if config.files.is_empty() {
            return Err(StoreError::config("No data file to watch"));
        }
        for file in &config.files {
            if file.parent().is_none() {
                return Err(StoreError::config(format!(
                    "Data file has no parent directory: {}",
                    file.display()
                )));
            }
        }

        Ok(Self {
            config,
            reload,
            watcher: None,
            processor_thread: None,
            running: Arc::new(Mutex::new(false)),
        })
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    /// Start watching
    ///
    /// Spawns a background thread for event filtering and debouncing
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(StoreError::config("Watcher already running"));
        }

        let (event_tx, event_rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(e) => warn!("file watcher error: {}", e),
            },
            NotifyConfig::default(),
        )?;

        let directories: HashSet<&Path> =
            self.config.files.iter().filter_map(|f| f.parent()).collect();
        for directory in directories {
            watcher.watch(directory, RecursiveMode::NonRecursive)?;
            debug!("watching {}", directory.display());
        }
        self.watcher = Some(watcher);

        let tracked: HashSet<PathBuf> = self.config.files.iter().cloned().collect();
        let debounce = self.config.debounce_duration;
        let reload = self.reload.clone();
        let running = self.running.clone();
        *running.lock() = true;

        self.processor_thread = Some(thread::spawn(move || {
            Self::process_events(event_rx, tracked, debounce, reload, running);
        }));

        info!("watching {} data files", self.config.files.len());
        Ok(())
    }

    /// Stop watching and wait for the processor thread
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        *self.running.lock() = false;
        self.watcher = None;

        if let Some(thread) = self.processor_thread.take() {
            thread
                .join()
                .map_err(|_| StoreError::io("Failed to join watcher thread"))?;
        }
        Ok(())
    }

    fn process_events(
        event_rx: Receiver<Event>,
        tracked: HashSet<PathBuf>,
        debounce: Duration,
        reload: Sender<PathBuf>,
        running: Arc<Mutex<bool>>,
    ) {
        let mut debouncer = Debouncer::new(debounce);

        while *running.lock() {
            match event_rx.recv_timeout(TICK) {
                Ok(event) => {
                    let now = Instant::now();
                    for path in Self::changed_paths(&event, &tracked) {
                        debouncer.touch(path, now);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            for path in debouncer.ready(Instant::now()) {
                if !path.exists() {
                    debug!("{} disappeared, not reloading", path.display());
                    continue;
                }
                info!("{} changed, reloading", path.display());
                if reload.send(path).is_err() {
                    warn!("loader stopped, file watcher exiting");
                    *running.lock() = false;
                    return;
                }
            }
        }
    }

    /// Tracked files touched by `event` in a way that warrants a reload
    pub fn changed_paths(event: &Event, tracked: &HashSet<PathBuf>) -> Vec<PathBuf> {
        let relevant = matches!(
            event.kind,
            EventKind::Any
                | EventKind::Create(_)
                | EventKind::Modify(ModifyKind::Any)
                | EventKind::Modify(ModifyKind::Data(_))
                | EventKind::Modify(ModifyKind::Name(_))
        );
        if !relevant {
            return Vec::new();
        }

        event
            .paths
            .iter()
            .filter_map(|path| Self::resolve_tracked(path, tracked))
            .collect()
    }

    /// Map an event path onto a tracked (canonical) data file
    ///
    /// Event paths may go through symlinks or name a file that no longer
    /// exists, so the parent directory is resolved on its own.
    fn resolve_tracked(path: &Path, tracked: &HashSet<PathBuf>) -> Option<PathBuf> {
        if tracked.contains(path) {
            return Some(path.to_path_buf());
        }

        let by_parent = match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => std::fs::canonicalize(parent).ok().map(|p| p.join(name)),
            _ => None,
        };
        by_parent
            .into_iter()
            .chain(std::fs::canonicalize(path).ok())
            .find(|candidate| tracked.contains(candidate))
    }
}

impl Drop for DataFileWatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
