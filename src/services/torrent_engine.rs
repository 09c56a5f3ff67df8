use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::errors::Result;

/// Public announce endpoints appended to raw magnet links to widen peer
/// discovery beyond whatever trackers the link itself carries.
pub const PUBLIC_TRACKERS: &[&str] = &[
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://open.demonii.com:1337/announce",
    "udp://tracker.coppersurfer.tk:6969/announce",
    "udp://tracker.leechers-paradise.org:6969/announce",
    "udp://9.rarbg.to:2710/announce",
    "udp://9.rarbg.me:2710/announce",
    "udp://tracker.openbittorrent.com:80/announce",
    "udp://tracker.internetwarriors.net:1337/announce",
    "udp://tracker.cyberia.is:6969/announce",
    "udp://exodus.desync.com:6969/announce",
    "wss://tracker.btorrent.xyz",
    "wss://tracker.openwebtorrent.com",
];

#[derive(Clone, Debug, Default)]
pub struct TransferStats {
    /// Completion fraction in `0.0..=1.0`.
    pub progress: f64,
    /// Bytes per second.
    pub download_speed: u64,
    pub eta_seconds: u64,
    pub num_peers: usize,
    pub downloaded: u64,
    pub total_bytes: u64,
}

/// Terminal outcome of a transfer. Progress is polled via `stats`, so the
/// event stream only carries completion and failure.
#[derive(Clone, Debug)]
pub enum TransferEvent {
    Done,
    Error(String),
}

/// A live transfer tracked by the engine.
pub trait TorrentHandle: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    /// Stops the transfer and releases engine resources. The event stream
    /// closes without a terminal event.
    fn destroy(&self);
    fn stats(&self) -> TransferStats;
    fn subscribe(&self) -> broadcast::Receiver<TransferEvent>;
}

/// Capability interface over the external peer-to-peer engine. This core
/// only orchestrates admission; transfer mechanics live behind this seam.
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    /// Starts tracking a transfer. Fails with
    /// `LauncherError::DuplicateTransfer` when the engine already tracks an
    /// equivalent transfer; callers recover by adopting the existing handle.
    async fn add(&self, locator: &str, download_dir: &Path) -> Result<Arc<dyn TorrentHandle>>;
    async fn find(&self, locator: &str) -> Option<Arc<dyn TorrentHandle>>;
    async fn find_by_info_hash(&self, info_hash: &str) -> Option<Arc<dyn TorrentHandle>>;
    async fn remove(&self, locator: &str) -> Result<()>;
}

/// Extracts the content-hash fragment (`xt=urn:btih:...`) from a magnet
/// link, lowercased. Used to look an existing transfer up when an add races
/// with one already tracked under a differently-decorated locator.
pub fn info_hash_fragment(locator: &str) -> Option<String> {
    let start = locator.find("btih:")? + "btih:".len();
    let fragment: String = locator[start..]
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric())
        .collect();
    if fragment.is_empty() {
        return None;
    }
    Some(fragment.to_ascii_lowercase())
}

/// Appends the public tracker list to a raw magnet link. Locators that are
/// not magnet links pass through untouched.
pub fn with_public_trackers(locator: &str) -> String {
    if !locator.starts_with("magnet:?") {
        return locator.to_string();
    }
    let mut widened = String::from(locator);
    for tracker in PUBLIC_TRACKERS {
        widened.push_str("&tr=");
        widened.push_str(&urlencoding::encode(tracker));
    }
    widened
}
