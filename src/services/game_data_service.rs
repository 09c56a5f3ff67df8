use std::path::PathBuf;

use crate::errors::{LauncherError, Result};
use crate::events::{LauncherEvent, StatusSink};
use crate::models::VersionDescriptor;
use crate::services::RemoteClient;
use crate::utils::file::FileManager;
use crate::utils::json::sanitize_json;

const CATALOG_FILE: &str = "catalog.json";
const CATALOG_VERSION_FILE: &str = "catalog_version.json";

/// Keeps the on-disk game catalog in sync with the remote dataset using a
/// lightweight version descriptor, so the heavy dataset is only transferred
/// when its version actually changed.
///
/// On a first run (no usable local dataset) the caller must await
/// `check_and_download_updates` before proceeding; with a local dataset in
/// place the refresh runs in the background and only affects the next
/// launch.
#[derive(Clone)]
pub struct GameDataService {
    client: RemoteClient,
    files: FileManager,
    sink: StatusSink,
    version_url: String,
    data_url: String,
}

impl GameDataService {
    pub fn new(
        client: RemoteClient,
        files: FileManager,
        sink: StatusSink,
        version_url: String,
        data_url: String,
    ) -> Self {
        Self {
            client,
            files,
            sink,
            version_url,
            data_url,
        }
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.files.app_data_dir().join(CATALOG_FILE)
    }

    fn version_path(&self) -> PathBuf {
        self.files.app_data_dir().join(CATALOG_VERSION_FILE)
    }

    /// A dataset is usable when the file exists and is non-empty.
    pub fn has_local_dataset(&self) -> bool {
        std::fs::metadata(self.dataset_path())
            .map(|meta| meta.len() > 0)
            .unwrap_or(false)
    }

    /// Reads the local dataset, stripping control characters that would
    /// abort parsing downstream.
    pub fn read_local_dataset(&self) -> Result<String> {
        let raw = std::fs::read_to_string(self.dataset_path())?;
        Ok(sanitize_json(&raw))
    }

    pub async fn check_and_download_updates(&self) -> Result<()> {
        std::fs::create_dir_all(self.files.app_data_dir())?;
        self.narrate("Checking for updates...");

        let remote = match self.fetch_remote_descriptor().await {
            Ok(descriptor) => descriptor,
            Err(err) => {
                tracing::warn!("could not check remote catalog version: {}", err);
                if !self.has_local_dataset() {
                    return Err(LauncherError::Bootstrap(
                        "no connection and no local game catalog".to_string(),
                    ));
                }
                // The existing local dataset stays in use.
                return Ok(());
            }
        };

        if self.needs_refresh(&remote) {
            self.narrate("Downloading game list...");
            self.download_dataset(&remote).await?;
            tracing::info!("game catalog updated to version {}", remote.version);
        } else {
            tracing::debug!("game catalog already at version {}", remote.version);
            self.narrate("Game list is up to date.");
        }
        Ok(())
    }

    async fn fetch_remote_descriptor(&self) -> Result<VersionDescriptor> {
        let raw = self.client.get_text(&self.version_url).await?;
        let descriptor = serde_json::from_str(&sanitize_json(&raw))?;
        Ok(descriptor)
    }

    fn needs_refresh(&self, remote: &VersionDescriptor) -> bool {
        if !self.has_local_dataset() {
            tracing::info!("catalog refresh: local dataset missing or empty");
            return true;
        }

        let local_raw = match std::fs::read_to_string(self.version_path()) {
            Ok(raw) => raw,
            Err(_) => {
                tracing::info!("catalog refresh: local version descriptor missing");
                return true;
            }
        };
        match serde_json::from_str::<VersionDescriptor>(&sanitize_json(&local_raw)) {
            Ok(local) => {
                if local.version != remote.version {
                    tracing::info!(
                        "catalog refresh: v{} -> v{}",
                        local.version,
                        remote.version
                    );
                    true
                } else {
                    false
                }
            }
            Err(_) => {
                tracing::warn!("local catalog version descriptor corrupt, forcing refresh");
                true
            }
        }
    }

    async fn download_dataset(&self, remote: &VersionDescriptor) -> Result<()> {
        let raw = self.client.get_text(&self.data_url).await?;
        let sanitized = sanitize_json(&raw);

        // The sanitized text is persisted either way; it gets re-sanitized
        // on every read, so a residual parse problem here is not fatal.
        if let Err(err) = serde_json::from_str::<serde_json::Value>(&sanitized) {
            tracing::warn!("downloaded catalog failed JSON validation: {}", err);
        }

        self.files
            .write_atomic(&self.dataset_path(), sanitized.as_bytes())?;
        let descriptor = serde_json::to_string_pretty(remote)?;
        self.files
            .write_atomic(&self.version_path(), descriptor.as_bytes())?;
        Ok(())
    }

    fn narrate(&self, message: &str) {
        self.sink.emit(LauncherEvent::DataStatus {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::discard_sink;
    use std::path::Path;
    use uuid::Uuid;

    fn temp_data_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("aurora-catalog-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp data directory");
        dir
    }

    fn service_for(dir: &Path) -> GameDataService {
        GameDataService::new(
            RemoteClient::new(),
            FileManager::new(dir.to_path_buf(), dir.join("install")),
            discard_sink(),
            // Unroutable endpoints: every fetch in these tests fails fast.
            "http://127.0.0.1:1/catalog_version.json".to_string(),
            "http://127.0.0.1:1/catalog.json".to_string(),
        )
    }

    #[tokio::test]
    async fn first_run_without_network_is_fatal_and_writes_nothing() {
        let dir = temp_data_dir();
        let service = service_for(&dir);

        let err = service
            .check_and_download_updates()
            .await
            .expect_err("bootstrap should fail");
        assert!(matches!(err, LauncherError::Bootstrap(_)));
        assert!(!service.dataset_path().exists());
    }

    #[tokio::test]
    async fn existing_dataset_survives_failed_refresh() {
        let dir = temp_data_dir();
        let service = service_for(&dir);
        std::fs::write(service.dataset_path(), r#"{"games": []}"#).expect("write dataset");

        service
            .check_and_download_updates()
            .await
            .expect("refresh failure must not surface");
        assert_eq!(
            service.read_local_dataset().expect("read dataset"),
            r#"{"games": []}"#
        );
    }

    #[test]
    fn empty_dataset_file_counts_as_missing() {
        let dir = temp_data_dir();
        let service = service_for(&dir);
        std::fs::write(service.dataset_path(), "").expect("write empty dataset");

        assert!(!service.has_local_dataset());
    }

    #[test]
    fn version_mismatch_forces_refresh() {
        let dir = temp_data_dir();
        let service = service_for(&dir);
        std::fs::write(service.dataset_path(), r#"{"games": []}"#).expect("write dataset");
        std::fs::write(dir.join(CATALOG_VERSION_FILE), r#"{"version": "4"}"#)
            .expect("write descriptor");

        let same = VersionDescriptor {
            version: "4".to_string(),
        };
        let newer = VersionDescriptor {
            version: "5".to_string(),
        };
        assert!(!service.needs_refresh(&same));
        assert!(service.needs_refresh(&newer));
    }

    #[test]
    fn corrupt_local_descriptor_forces_refresh() {
        let dir = temp_data_dir();
        let service = service_for(&dir);
        std::fs::write(service.dataset_path(), r#"{"games": []}"#).expect("write dataset");
        std::fs::write(dir.join(CATALOG_VERSION_FILE), "{not json").expect("write descriptor");

        let remote = VersionDescriptor {
            version: "4".to_string(),
        };
        assert!(service.needs_refresh(&remote));
    }

    #[test]
    fn local_dataset_is_sanitized_on_read() {
        let dir = temp_data_dir();
        let service = service_for(&dir);
        std::fs::write(service.dataset_path(), "{\"name\": \"ga\u{0002}me\"}")
            .expect("write dataset");

        let text = service.read_local_dataset().expect("read dataset");
        let value: serde_json::Value = serde_json::from_str(&text).expect("parse sanitized");
        assert_eq!(value["name"], "game");
    }
}
