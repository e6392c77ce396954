//! Data file loader
//!
//! Reads data files on a dedicated worker thread and streams the parsed lines
//! to the single writer over a channel. The worker never touches the store.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::ports::{IngestEvent, LineParser};
use crate::error::{Result, StoreError};

/// Per-file outcome of one read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStats {
    pub records: usize,
    pub malformed: usize,
}

/// Registry of data files to import
#[derive(Debug, Clone, Default)]
pub struct DataFileLoader {
    files: Vec<PathBuf>,
}

impl DataFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data file; returns `false` if it was already registered
    ///
    /// # Errors
    /// Returns error if the path does not exist or cannot be opened for reading
    pub fn add_data_file(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        let normalized = std::fs::canonicalize(path).map_err(|e| {
            StoreError::io(format!(
                "You have to provide a path to an existing data file - path: {}",
                path.display()
            ))
            .with_source(e)
        })?;

        if self.files.contains(&normalized) {
            return Ok(false);
        }

        File::open(&normalized).map_err(|e| {
            StoreError::io(format!("Data file is not readable: {}", normalized.display()))
                .with_source(e)
        })?;

        debug!("added data file {}", normalized.display());
        self.files.push(normalized);
        Ok(true)
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Spawn the ingestion worker
    ///
    /// Returns the handle used to request file reads and the event stream the
    /// writer consumes. The stream ends once the handle is closed and every
    /// pending request has been read.
    pub fn spawn(parser: Arc<dyn LineParser>) -> (LoaderHandle, Receiver<IngestEvent>) {
        let (request_tx, request_rx) = channel::<PathBuf>();
        let (event_tx, event_rx) = channel();

        let worker = thread::spawn(move || {
            for path in request_rx {
                match read_source(&path, parser.as_ref(), &event_tx) {
                    Ok(_) => {}
                    Err(e) if e.is(crate::error::ErrorKind::Ingest) => {
                        debug!("writer gone, stopping loader: {}", e);
                        break;
                    }
                    Err(e) => error!("failed to load {}: {}", path.display(), e),
                }
            }
        });

        let handle = LoaderHandle {
            requests: Some(request_tx),
            worker: Some(worker),
        };
        (handle, event_rx)
    }

    /// Request a read of every registered file
    ///
    /// # Errors
    /// Returns error if no data file has been added
    pub fn load(&self, handle: &LoaderHandle) -> Result<usize> {
        if self.files.is_empty() {
            return Err(StoreError::ingest("No data file has been provided"));
        }

        info!("start loading {} data files", self.files.len());
        for path in &self.files {
            handle.request(path.clone())?;
        }
        Ok(self.files.len())
    }
}

/// Handle to a running ingestion worker
pub struct LoaderHandle {
    requests: Option<Sender<PathBuf>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl LoaderHandle {
    /// Ask the worker to (re)read one file
    pub fn request(&self, path: PathBuf) -> Result<()> {
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| StoreError::ingest("Loader is closed"))?;
        requests
            .send(path)
            .map_err(|_| StoreError::ingest("Loader worker has stopped"))
    }

    /// Sender for collaborators that trigger reloads (e.g. the file watcher)
    pub fn requester(&self) -> Option<Sender<PathBuf>> {
        self.requests.clone()
    }

    /// Stop accepting requests. The worker exits after the queued ones.
    pub fn close(&mut self) {
        self.requests = None;
    }

    /// Close and wait for the worker to exit
    pub fn join(mut self) -> Result<()> {
        self.close();
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| StoreError::ingest("Loader worker panicked")),
            None => Ok(()),
        }
    }
}

/// Read one file and stream it as an import pass
///
/// Nothing is sent when the file cannot be opened, and `SourceComplete` is
/// withheld when reading fails midway, so no records are swept for it.
pub fn read_source(
    path: &Path,
    parser: &dyn LineParser,
    events: &Sender<IngestEvent>,
) -> Result<FileStats> {
    let started = Instant::now();
    let source = path.display().to_string();
    let file = File::open(path)?;

    send(events, IngestEvent::SourceStarted { source: source.clone() })?;

    let mut stats = FileStats::default();
    for raw in BufReader::new(file).split(b'\n') {
        let raw = raw?;
        // undecodable bytes become U+FFFD and the line fails to parse
        let line = String::from_utf8_lossy(&raw);
        if line.trim().is_empty() {
            continue;
        }
        match parser.parse_line(&line, &source) {
            Some(record) => {
                stats.records += 1;
                send(events, IngestEvent::Record(record))?;
            }
            None => {
                stats.malformed += 1;
                debug!("skipping malformed line in {}: {:?}", source, line);
            }
        }
    }

    send(events, IngestEvent::SourceComplete { source: source.clone() })?;

    if stats.malformed > 0 {
        warn!("{}: skipped {} malformed lines", source, stats.malformed);
    }
    info!(
        "loaded {} records from {} in {:.3} ms",
        stats.records,
        source,
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(stats)
}

fn send(events: &Sender<IngestEvent>, event: IngestEvent) -> Result<()> {
    events
        .send(event)
        .map_err(|_| StoreError::ingest("Ingest event channel closed"))
}
