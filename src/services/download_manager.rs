use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crate::errors::LauncherError;
use crate::events::{LauncherEvent, StatusSink};
use crate::models::{
    ActiveTransferStatus, DownloadTask, QueueSnapshot, QueueStatus, QueuedTransferStatus,
    TransferState,
};
use crate::services::disk_monitor::{self, DiskSpaceMonitor};
use crate::services::torrent_engine::{
    info_hash_fragment, with_public_trackers, TorrentEngine, TorrentHandle, TransferEvent,
};
use crate::utils::file::FileManager;

const QUEUE_STATE_FILE: &str = "torrents_state.json";

struct ActiveTransfer {
    task: DownloadTask,
    handle: Arc<dyn TorrentHandle>,
}

#[derive(Default)]
struct QueueInner {
    pending: VecDeque<DownloadTask>,
    active: Option<ActiveTransfer>,
    paused: bool,
    monitor: Option<DiskSpaceMonitor>,
}

/// Serializes torrent downloads one at a time: a FIFO queue of pending
/// tasks, a single active slot, snapshot persistence after every mutation
/// and a free-space watchdog on the active destination.
///
/// All queue state lives behind one mutex; the engine seam and the status
/// sink are injected by the composition root.
#[derive(Clone)]
pub struct DownloadManager {
    engine: Arc<dyn TorrentEngine>,
    files: FileManager,
    sink: StatusSink,
    state_path: PathBuf,
    inner: Arc<Mutex<QueueInner>>,
}

impl DownloadManager {
    pub fn new(engine: Arc<dyn TorrentEngine>, files: FileManager, sink: StatusSink) -> Self {
        let state_path = files.app_data_dir().join(QUEUE_STATE_FILE);
        Self {
            engine,
            files,
            sink,
            state_path,
            inner: Arc::new(Mutex::new(QueueInner::default())),
        }
    }

    /// Reloads the persisted snapshot after a restart. The previously
    /// active task goes back to the head of the queue and is started
    /// un-paused; only in-flight transfer progress is lost, never queue
    /// membership.
    pub async fn restore(&self) {
        let snapshot: QueueSnapshot = match self.files.load_json(&self.state_path) {
            Some(snapshot) => snapshot,
            None => return,
        };

        let mut inner = self.inner.lock().await;
        inner.pending = snapshot.pending.into();
        if let Some(active) = snapshot.active {
            inner.pending.push_front(active);
        }
        self.advance_locked(&mut inner).await;
    }

    pub async fn enqueue(&self, task: DownloadTask, delete_existing: bool) {
        if delete_existing && task.path.exists() {
            if let Err(err) = std::fs::remove_dir_all(&task.path) {
                tracing::error!(
                    "error deleting existing content at {}: {}",
                    task.path.display(),
                    err
                );
            }
            if let Err(err) = std::fs::create_dir_all(&task.path) {
                tracing::error!("error recreating {}: {}", task.path.display(), err);
            }
        }

        let mut inner = self.inner.lock().await;
        inner.pending.push_back(task);
        self.persist_locked(&inner);
        self.advance_locked(&mut inner).await;
    }

    /// Moves a pending task to the head of the queue. Fails for the active
    /// task and for unknown ids.
    pub async fn prioritize(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(index) = inner.pending.iter().position(|task| task.id == id) else {
            return false;
        };
        if let Some(task) = inner.pending.remove(index) {
            inner.pending.push_front(task);
        }
        self.persist_locked(&inner);
        true
    }

    /// Jump the line and preempt: the target task becomes active
    /// immediately; a previously active transfer is stopped and re-queued
    /// at the head (the engine may restart it from scratch later).
    pub async fn force_start(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(index) = inner.pending.iter().position(|task| task.id == id) else {
            return false;
        };
        let target = match inner.pending.remove(index) {
            Some(task) => task,
            None => return false,
        };

        if let Some(prior) = inner.active.take() {
            prior.handle.destroy();
            inner.paused = false;
            if let Some(monitor) = inner.monitor.take() {
                monitor.stop();
            }
            inner.pending.push_front(prior.task);
        }
        inner.pending.push_front(target);
        self.persist_locked(&inner);
        self.advance_locked(&mut inner).await;
        true
    }

    pub async fn pause(&self) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(active) = inner.active.as_ref() else {
            return false;
        };
        active.handle.pause();
        inner.paused = true;
        true
    }

    pub async fn resume(&self) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(active) = inner.active.as_ref() else {
            return false;
        };
        active.handle.resume();
        inner.paused = false;
        true
    }

    pub async fn cancel(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().await;

        let is_active = inner
            .active
            .as_ref()
            .map(|active| active.task.id == id)
            .unwrap_or(false);
        if is_active {
            if let Some(active) = inner.active.take() {
                active.handle.destroy();
            }
            inner.paused = false;
            if let Some(monitor) = inner.monitor.take() {
                monitor.stop();
            }
            self.persist_locked(&inner);
            self.advance_locked(&mut inner).await;
            return true;
        }

        if let Some(index) = inner.pending.iter().position(|task| task.id == id) {
            inner.pending.remove(index);
            self.persist_locked(&inner);
            return true;
        }

        false
    }

    pub async fn status(&self) -> QueueStatus {
        let inner = self.inner.lock().await;
        let active = inner.active.as_ref().map(|active| {
            let stats = active.handle.stats();
            ActiveTransferStatus {
                id: active.task.id.clone(),
                name: active.task.name.clone(),
                progress: stats.progress,
                download_speed: stats.download_speed,
                eta_seconds: stats.eta_seconds,
                num_peers: stats.num_peers,
                downloaded: stats.downloaded,
                total_bytes: stats.total_bytes,
                state: if inner.paused {
                    TransferState::Paused
                } else {
                    TransferState::Downloading
                },
            }
        });
        let pending = inner
            .pending
            .iter()
            .map(|task| QueuedTransferStatus {
                id: task.id.clone(),
                name: task.name.clone(),
                state: TransferState::Queued,
            })
            .collect();
        QueueStatus { active, pending }
    }

    /// Starts the next pending task when no transfer is active. A task the
    /// engine rejects is reported through the sink and skipped, so one bad
    /// task never stalls the queue.
    async fn advance_locked(&self, inner: &mut QueueInner) {
        loop {
            if inner.active.is_some() {
                return;
            }
            let Some(task) = inner.pending.pop_front() else {
                return;
            };

            tracing::info!(
                "starting download for {} to {}",
                task.name,
                task.path.display()
            );
            if let Err(err) = std::fs::create_dir_all(&task.path) {
                tracing::error!(
                    "cannot create download directory {}: {}",
                    task.path.display(),
                    err
                );
            }
            inner.paused = false;

            let locator = with_public_trackers(&task.magnet);
            let handle = match self.acquire_handle(&task, &locator).await {
                Some(handle) => handle,
                None => {
                    // Reported already; drop the task and try the next one.
                    self.persist_locked(inner);
                    continue;
                }
            };

            let events = handle.subscribe();
            inner.monitor = Some(self.spawn_disk_monitor(task.path.clone()));
            self.spawn_terminal_watcher(task.clone(), events);
            inner.active = Some(ActiveTransfer { task, handle });
            self.persist_locked(inner);
            return;
        }
    }

    /// Hands the locator to the engine, adopting an equivalent transfer the
    /// engine already tracks (by exact locator, then by the content-hash
    /// fragment) instead of failing on a duplicate add.
    async fn acquire_handle(
        &self,
        task: &DownloadTask,
        locator: &str,
    ) -> Option<Arc<dyn TorrentHandle>> {
        if let Some(existing) = self.engine.find(locator).await {
            tracing::info!("transfer already tracked for {}, adopting it", task.name);
            return Some(existing);
        }

        match self.engine.add(locator, &task.path).await {
            Ok(handle) => Some(handle),
            Err(LauncherError::DuplicateTransfer(_)) => {
                let found = match info_hash_fragment(locator) {
                    Some(hash) => self.engine.find_by_info_hash(&hash).await,
                    None => None,
                };
                match found {
                    Some(handle) => {
                        tracing::info!("adopted existing transfer by info hash for {}", task.name);
                        Some(handle)
                    }
                    None => {
                        tracing::error!(
                            "duplicate-add error but no existing transfer found for {}",
                            task.name
                        );
                        self.report_task_error(task, "duplicate transfer could not be adopted");
                        None
                    }
                }
            }
            Err(err) => {
                tracing::error!("error adding transfer for {}: {}", task.name, err);
                self.report_task_error(task, &err.to_string());
                None
            }
        }
    }

    fn report_task_error(&self, task: &DownloadTask, error: &str) {
        self.sink.emit(LauncherEvent::TorrentError {
            id: task.id.clone(),
            name: task.name.clone(),
            error: error.to_string(),
        });
    }

    fn spawn_terminal_watcher(
        &self,
        task: DownloadTask,
        mut events: broadcast::Receiver<TransferEvent>,
    ) {
        let manager = self.clone();
        tokio::spawn(async move {
            match events.recv().await {
                Ok(TransferEvent::Done) => {
                    tracing::info!("download finished: {}", task.name);
                    manager.sink.emit(LauncherEvent::TorrentFinished {
                        id: task.id.clone(),
                        name: task.name.clone(),
                        path: task.path.clone(),
                    });
                    manager.finish_active(&task.id).await;
                }
                Ok(TransferEvent::Error(error)) => {
                    tracing::error!("download error for {}: {}", task.name, error);
                    manager.sink.emit(LauncherEvent::TorrentError {
                        id: task.id.clone(),
                        name: task.name.clone(),
                        error,
                    });
                    manager.finish_active(&task.id).await;
                }
                // Stream closed without a terminal event: the handle was
                // destroyed by cancel or force-start, which advance the
                // queue themselves.
                Err(_) => {}
            }
        });
    }

    async fn finish_active(&self, id: &str) {
        let mut inner = self.inner.lock().await;
        let matches = inner
            .active
            .as_ref()
            .map(|active| active.task.id == id)
            .unwrap_or(false);
        if !matches {
            return;
        }
        inner.active = None;
        inner.paused = false;
        if let Some(monitor) = inner.monitor.take() {
            monitor.stop();
        }
        self.persist_locked(&inner);
        self.advance_locked(&mut inner).await;
    }

    fn spawn_disk_monitor(&self, path: PathBuf) -> DiskSpaceMonitor {
        let manager = self.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(disk_monitor::POLL_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                let free = disk_monitor::available_disk_space(&path);
                manager.handle_disk_sample(free).await;
            }
        });
        DiskSpaceMonitor::new(task)
    }

    /// Pauses the active transfer when the destination volume runs low.
    /// `None` means free space could not be determined; the check is
    /// skipped silently. The low-space signal fires once per crossing and
    /// re-arms when the transfer is resumed.
    pub(crate) async fn handle_disk_sample(&self, free_bytes: Option<u64>) {
        let Some(free) = free_bytes else { return };
        if !disk_monitor::is_low_space(free) {
            return;
        }

        let mut inner = self.inner.lock().await;
        if inner.paused {
            return;
        }
        let Some(active) = inner.active.as_ref() else {
            return;
        };
        active.handle.pause();
        tracing::warn!(
            "low disk space ({} bytes free), pausing {}",
            free,
            active.task.name
        );
        inner.paused = true;
        self.sink.emit(LauncherEvent::LowDiskSpace);
    }

    fn persist_locked(&self, inner: &QueueInner) {
        let snapshot = QueueSnapshot {
            pending: inner.pending.iter().cloned().collect(),
            active: inner.active.as_ref().map(|active| active.task.clone()),
        };
        let result = serde_json::to_vec_pretty(&snapshot)
            .map_err(crate::errors::LauncherError::from)
            .and_then(|bytes| {
                self.files
                    .write_atomic(&self.state_path, &bytes)
                    .map_err(Into::into)
            });
        if let Err(err) = result {
            tracing::error!("failed to save torrent state: {}", err);
        }
    }
}
