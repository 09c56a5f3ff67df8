use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One queued or active torrent transfer. Identity is `id`; the task is
/// owned by the download manager until it reaches a terminal state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTask {
    pub id: String,
    pub magnet: String,
    pub path: PathBuf,
    pub name: String,
}

/// Persisted queue state. The paused flag of the active transfer is
/// deliberately not part of the snapshot: a restart always resumes
/// un-paused.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    #[serde(default)]
    pub pending: Vec<DownloadTask>,
    #[serde(default)]
    pub active: Option<DownloadTask>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Downloading,
    Paused,
    Queued,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTransferStatus {
    pub id: String,
    pub name: String,
    pub progress: f64,
    pub download_speed: u64,
    pub eta_seconds: u64,
    pub num_peers: usize,
    pub downloaded: u64,
    pub total_bytes: u64,
    pub state: TransferState,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedTransferStatus {
    pub id: String,
    pub name: String,
    pub state: TransferState,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub active: Option<ActiveTransferStatus>,
    pub pending: Vec<QueuedTransferStatus>,
}

/// Version document exchanged with the update and catalog endpoints.
/// Only the `version` field matters; anything else the server sends is
/// carried along untouched.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub version: String,
}
