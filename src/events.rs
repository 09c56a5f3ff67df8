use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

/// Fire-and-forget status events pushed to the surrounding shell. The sink
/// carries no result and no backpressure; delivery is best-effort narration
/// for display, never control flow.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum LauncherEvent {
    #[serde(rename_all = "camelCase")]
    TorrentFinished {
        id: String,
        name: String,
        path: PathBuf,
    },
    #[serde(rename_all = "camelCase")]
    TorrentError {
        id: String,
        name: String,
        error: String,
    },
    LowDiskSpace,
    #[serde(rename_all = "camelCase")]
    UpdateMessage { message: String },
    #[serde(rename_all = "camelCase")]
    DataStatus { message: String },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: LauncherEvent);
}

impl<F> EventSink for F
where
    F: Fn(LauncherEvent) + Send + Sync,
{
    fn emit(&self, event: LauncherEvent) {
        self(event)
    }
}

pub type StatusSink = Arc<dyn EventSink>;

/// Sink that drops every event, for callers that do not care about
/// narration.
pub fn discard_sink() -> StatusSink {
    Arc::new(|_event: LauncherEvent| {})
}
