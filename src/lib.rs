//! Download and update orchestration core for the Aurora game launcher.
//!
//! The surrounding desktop shell owns windows, tray and IPC; this crate
//! owns the serialized torrent queue, the catalog/manifest synchronization
//! and the self-update pipeline. The shell builds one [`AppState`] with an
//! injected torrent engine and status sink, calls [`AppState::startup`] at
//! readiness, and exits when a staged update is pending.

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::LauncherConfig;
use crate::errors::Result;
use crate::events::StatusSink;
use crate::services::{
    DownloadManager, GameDataService, ManifestService, RemoteClient, TorrentEngine, UpdateOutcome,
    UpdateService,
};
use crate::utils::file::FileManager;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartupOutcome {
    /// The shell may show its window; local data is usable.
    Ready,
    /// A staged update is about to replace the installation. The shell must
    /// exit immediately so the staging script can take over the files.
    RestartPending,
}

/// Composition root. Every service is owned here and handed out by
/// reference; there are no ambient singletons.
#[derive(Clone)]
pub struct AppState {
    pub config: LauncherConfig,
    pub files: FileManager,
    pub remote: RemoteClient,
    pub downloads: DownloadManager,
    pub updates: UpdateService,
    pub catalog: GameDataService,
    pub manifests: ManifestService,
}

impl AppState {
    pub fn initialize(
        config: LauncherConfig,
        engine: Arc<dyn TorrentEngine>,
        sink: StatusSink,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let files = FileManager::new(config.data_dir.clone(), config.install_dir.clone());
        let remote = RemoteClient::new();
        let downloads = DownloadManager::new(engine, files.clone(), sink.clone());
        let updates = UpdateService::new(remote.clone(), files.clone(), sink.clone(), &config);
        let catalog = GameDataService::new(
            remote.clone(),
            files.clone(),
            sink,
            config.catalog_version_url.clone(),
            config.catalog_data_url.clone(),
        );
        let manifests = ManifestService::new(remote.clone(), config.manifest_url.clone(), files.clone());
        Ok(Self {
            config,
            files,
            remote,
            downloads,
            updates,
            catalog,
            manifests,
        })
    }

    /// The launch sequence, in the order the shell depends on:
    ///
    /// 1. Self-update check. A staged update short-circuits startup.
    /// 2. Catalog sync. The very first run has nothing to show and must
    ///    block until the dataset exists (the one fatal path); any later
    ///    run refreshes in the background and only affects the next launch.
    /// 3. Download-queue restore from the persisted snapshot.
    pub async fn startup(&self) -> Result<StartupOutcome> {
        if self.updates.check_and_apply().await == UpdateOutcome::Relaunching {
            return Ok(StartupOutcome::RestartPending);
        }

        if self.catalog.has_local_dataset() {
            let catalog = self.catalog.clone();
            tokio::spawn(async move {
                if let Err(err) = catalog.check_and_download_updates().await {
                    tracing::error!("background catalog refresh failed: {}", err);
                }
            });
        } else {
            self.catalog.check_and_download_updates().await?;
        }

        self.downloads.restore().await;
        Ok(StartupOutcome::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LauncherError;
    use crate::events::discard_sink;
    use crate::services::torrent_engine::TorrentHandle;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use uuid::Uuid;

    struct NoopEngine;

    #[async_trait]
    impl TorrentEngine for NoopEngine {
        async fn add(
            &self,
            locator: &str,
            _download_dir: &Path,
        ) -> Result<Arc<dyn TorrentHandle>> {
            Err(LauncherError::Engine(format!("engine offline: {locator}")))
        }

        async fn find(&self, _locator: &str) -> Option<Arc<dyn TorrentHandle>> {
            None
        }

        async fn find_by_info_hash(&self, _info_hash: &str) -> Option<Arc<dyn TorrentHandle>> {
            None
        }

        async fn remove(&self, _locator: &str) -> Result<()> {
            Ok(())
        }
    }

    fn temp_config() -> LauncherConfig {
        let dir = std::env::temp_dir().join(format!("aurora-app-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp data directory");
        LauncherConfig {
            data_dir: dir.clone(),
            install_dir: dir.join("install"),
            // Unroutable endpoints: every fetch fails fast.
            catalog_version_url: "http://127.0.0.1:1/catalog_version.json".to_string(),
            catalog_data_url: "http://127.0.0.1:1/catalog.json".to_string(),
            update_version_url: "http://127.0.0.1:1/launcher_version.json".to_string(),
            update_bundle_url: "http://127.0.0.1:1/aurora-launcher.zip".to_string(),
            manifest_url: "http://127.0.0.1:1/manifest.yaml".to_string(),
            app_version: "1.0.0".to_string(),
            packaged: false,
        }
    }

    fn app_for(config: LauncherConfig) -> AppState {
        AppState::initialize(config, Arc::new(NoopEngine), discard_sink())
            .expect("initialize app state")
    }

    fn dataset_path(config: &LauncherConfig) -> PathBuf {
        config.data_dir.join("catalog.json")
    }

    #[tokio::test]
    async fn first_run_without_catalog_fails_startup() {
        let config = temp_config();
        let app = app_for(config);

        let err = app.startup().await.expect_err("bootstrap must fail");
        assert!(matches!(err, LauncherError::Bootstrap(_)));
    }

    #[tokio::test]
    async fn existing_catalog_lets_startup_proceed_offline() {
        let config = temp_config();
        std::fs::write(dataset_path(&config), r#"{"games": []}"#).expect("seed dataset");
        let app = app_for(config);

        let outcome = app.startup().await.expect("startup with local data");
        assert_eq!(outcome, StartupOutcome::Ready);
    }
}
