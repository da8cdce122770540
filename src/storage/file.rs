//! File-backed storage
//!
//! Wraps a [`MemoryStore`] and makes it survive restarts by dumping the
//! whole store into a snapshot file, one JSON metric per line.
//!
//! ## Durability modes
//!
//! - **Periodic** (`interval > 0`): updates only touch memory, a background
//!   task writes a snapshot every `interval`. A crash loses at most one
//!   interval worth of updates.
//! - **Synchronous** (`interval == 0`): every update writes a snapshot
//!   before returning, I/O failures are returned to the caller.
//!
//! In both modes [`Storage::close`] stops the background task and waits for
//! its final snapshot, so a clean shutdown never loses an update.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use super::backend::Storage;
use super::error::{StorageError, StorageResult};
use super::memory::MemoryStore;
use crate::metrics::{MetricKind, MetricValue, NamedMetric, json};
use crate::retry::RetryPolicy;

/// Wake-up period of the background task in synchronous mode, where it only
/// exists to write the final snapshot on shutdown
const SYNC_MODE_WAKEUP: Duration = Duration::from_secs(24 * 60 * 60);

/// Default snapshot interval
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Options for [`FileStore::open`]
#[derive(Debug, Clone)]
pub struct FileStoreOptions {
    /// Snapshot file
    pub path: PathBuf,

    /// Time between snapshots, zero for synchronous snapshots
    pub interval: Duration,

    /// Load the snapshot file on startup
    pub restore: bool,

    /// Retry policy for opening the snapshot file
    pub retry: RetryPolicy,
}

impl FileStoreOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interval: DEFAULT_INTERVAL,
            restore: true,
            retry: RetryPolicy::default(),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn restore(mut self, restore: bool) -> Self {
        self.restore = restore;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Writes the content of a memory store to the snapshot file
#[derive(Debug)]
struct Snapshotter {
    memory: Arc<MemoryStore>,
    path: PathBuf,
    retry: RetryPolicy,

    /// Serializes writers so concurrent snapshots never interleave in the file
    write_lock: Mutex<()>,
}

impl Snapshotter {
    async fn flush(&self) -> StorageResult<usize> {
        let _guard = self.write_lock.lock().await;

        // the enumeration takes the store lock, so this is a point-in-time view
        let mut metrics = self.memory.list().await?;
        metrics.sort_by(|a, b| (a.kind(), &a.name).cmp(&(b.kind(), &b.name)));

        let path = self.path.as_path();
        let file = self
            .retry
            .run(move || File::create(path), |_| true)
            .await
            .map_err(StorageError::persistence(path))?;

        write_snapshot(file, &metrics)
            .await
            .map_err(StorageError::persistence(path))?;

        Ok(metrics.len())
    }

    /// Flush from the background task, where there is no caller to report to
    async fn save(&self) -> StorageResult<()> {
        match self.flush().await {
            Ok(count) => {
                info!("saved {} metrics to {}", count, self.path.display());
                Ok(())
            }
            Err(e) => {
                error!("failed to save metrics to file: {}", e);
                Err(e)
            }
        }
    }

    async fn restore(&self) -> StorageResult<usize> {
        let path = self.path.as_path();
        // a missing file is the normal first start, not a transient failure
        let file = self
            .retry
            .run(
                move || File::open(path),
                |e| e.kind() != std::io::ErrorKind::NotFound,
            )
            .await
            .map_err(StorageError::persistence(path))?;

        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0;
        let mut restored = 0;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(StorageError::persistence(path))?
        {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let metric = json::from_line(&line).map_err(|reason| StorageError::Snapshot {
                line: line_no,
                reason,
            })?;

            // duplicate counter lines are summed, like any other update
            self.memory.update(&metric.name, metric.value).await?;
            restored += 1;
        }

        Ok(restored)
    }
}

async fn write_snapshot(file: File, metrics: &[NamedMetric]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(file);

    for metric in metrics {
        let line = json::to_line(metric)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    writer.flush().await
}

/// Handle of the background snapshot task
#[derive(Debug)]
struct PersistenceTask {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<StorageResult<()>>,
}

impl PersistenceTask {
    fn spawn(snapshotter: Arc<Snapshotter>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let period = if interval.is_zero() {
            SYNC_MODE_WAKEUP
        } else {
            interval
        };

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    // also fires when the store is dropped without being closed
                    _ = &mut stop_rx => {
                        debug!("persistence loop stopping, writing final snapshot");
                        return snapshotter.save().await;
                    }
                    _ = ticker.tick() => {
                        if interval.is_zero() {
                            continue;
                        }
                        // failures are logged, the next tick retries
                        let _ = snapshotter.save().await;
                    }
                }
            }
        });

        Self { stop_tx, handle }
    }
}

/// File-backed storage backend
#[derive(Debug)]
pub struct FileStore {
    memory: Arc<MemoryStore>,
    snapshotter: Arc<Snapshotter>,
    interval: Duration,
    task: Mutex<Option<PersistenceTask>>,
}

impl FileStore {
    /// Create the store, restore the snapshot if requested and start the
    /// background persistence task
    ///
    /// A snapshot that cannot be read is logged and the store starts with
    /// whatever could be restored.
    #[instrument(skip_all, fields(path = %options.path.display()))]
    pub async fn open(options: FileStoreOptions) -> Self {
        let memory = Arc::new(MemoryStore::new());
        let snapshotter = Arc::new(Snapshotter {
            memory: memory.clone(),
            path: options.path,
            retry: options.retry,
            write_lock: Mutex::new(()),
        });

        if options.restore {
            info!("restoring metrics from {}", snapshotter.path.display());
            match snapshotter.restore().await {
                Ok(count) => info!("restored {} metrics", count),
                Err(e) => error!("failed to restore metrics from file: {}", e),
            }
        }

        if options.interval.is_zero() {
            info!("snapshots are written synchronously on every update");
        } else {
            info!("snapshots are written every {:?}", options.interval);
        }

        let task = PersistenceTask::spawn(snapshotter.clone(), options.interval);

        Self {
            memory,
            snapshotter,
            interval: options.interval,
            task: Mutex::new(Some(task)),
        }
    }

    /// Write a snapshot now
    pub async fn flush(&self) -> StorageResult<()> {
        self.snapshotter.flush().await.map(|_| ())
    }

    pub fn path(&self) -> &Path {
        &self.snapshotter.path
    }

    pub fn is_synchronous(&self) -> bool {
        self.interval.is_zero()
    }
}

#[async_trait]
impl Storage for FileStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, kind: MetricKind, name: &str) -> StorageResult<MetricValue> {
        self.memory.get(kind, name).await
    }

    async fn update(&self, name: &str, value: MetricValue) -> StorageResult<()> {
        self.memory.update(name, value).await?;

        if self.is_synchronous() {
            self.snapshotter.flush().await?;
        }

        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<NamedMetric>> {
        self.memory.list().await
    }

    #[instrument(skip(self))]
    async fn close(&self) -> StorageResult<()> {
        let Some(task) = self.task.lock().await.take() else {
            debug!("file backend already closed");
            return Ok(());
        };

        if task.stop_tx.send(()).is_err() {
            warn!("persistence loop already gone");
        }

        let result = match task.handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("persistence loop failed: {}", e);
                Ok(())
            }
        };

        self.memory.close().await?;
        info!("closed file backend");
        result
    }
}
