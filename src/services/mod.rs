pub mod disk_monitor;
pub mod download_manager;
pub mod game_data_service;
pub mod manifest_service;
pub mod remote_client;
pub mod torrent_engine;
pub mod update_service;

pub use download_manager::DownloadManager;
pub use game_data_service::GameDataService;
pub use manifest_service::{ManifestDocument, ManifestService, TtlCacheStore};
pub use remote_client::RemoteClient;
pub use torrent_engine::{TorrentEngine, TorrentHandle, TransferEvent, TransferStats};
pub use update_service::{UpdateAction, UpdateDecision, UpdateOutcome, UpdateService};
