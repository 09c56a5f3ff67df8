use std::path::PathBuf;
use std::time::Duration;

use crate::errors::Result;
use crate::services::RemoteClient;
use crate::utils::file::FileManager;

const MANIFEST_FILE: &str = "save_manifest.yaml";
const MANIFEST_STAMP_FILE: &str = "save_manifest.stamp";
const MANIFEST_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Clone, Debug)]
pub struct ManifestDocument {
    pub text: String,
    /// True when this copy came from the network rather than the cache.
    pub refreshed: bool,
}

/// On-disk cache of a remote document paired with an epoch-millis stamp
/// file recording when it was fetched.
#[derive(Clone)]
pub struct TtlCacheStore {
    payload_path: PathBuf,
    stamp_path: PathBuf,
    ttl: Duration,
    files: FileManager,
}

impl TtlCacheStore {
    pub fn new(
        payload_path: PathBuf,
        stamp_path: PathBuf,
        ttl: Duration,
        files: FileManager,
    ) -> Self {
        Self {
            payload_path,
            stamp_path,
            ttl,
            files,
        }
    }

    fn fetched_at_ms(&self) -> Option<i64> {
        let raw = std::fs::read_to_string(&self.stamp_path).ok()?;
        raw.trim().parse::<i64>().ok()
    }

    pub fn read_cached(&self) -> Option<String> {
        std::fs::read_to_string(&self.payload_path).ok()
    }

    /// Returns the cached payload only while it is younger than the TTL.
    pub fn read_fresh(&self) -> Option<String> {
        let fetched_at = self.fetched_at_ms()?;
        let age_ms = chrono::Utc::now()
            .timestamp_millis()
            .saturating_sub(fetched_at);
        if age_ms < 0 || age_ms as u128 >= self.ttl.as_millis() {
            return None;
        }
        self.read_cached()
    }

    pub fn store(&self, payload: &str) -> Result<()> {
        self.files
            .write_atomic(&self.payload_path, payload.as_bytes())?;
        let stamp = chrono::Utc::now().timestamp_millis().to_string();
        self.files.write_atomic(&self.stamp_path, stamp.as_bytes())?;
        Ok(())
    }
}

/// Weekly-freshness cache of the remote save-location manifest. The
/// manifest changes rarely, so a fetch failure falls back to whatever copy
/// exists locally and only propagates when there is none at all.
#[derive(Clone)]
pub struct ManifestService {
    client: RemoteClient,
    url: String,
    store: TtlCacheStore,
}

impl ManifestService {
    pub fn new(client: RemoteClient, url: String, files: FileManager) -> Self {
        let payload_path = files.app_data_dir().join(MANIFEST_FILE);
        let stamp_path = files.app_data_dir().join(MANIFEST_STAMP_FILE);
        let store = TtlCacheStore::new(payload_path, stamp_path, MANIFEST_TTL, files);
        Self { client, url, store }
    }

    pub async fn fetch_or_cached(&self, force: bool) -> Result<ManifestDocument> {
        if !force {
            if let Some(text) = self.store.read_fresh() {
                return Ok(ManifestDocument {
                    text,
                    refreshed: false,
                });
            }
        }

        match self.client.get_text(&self.url).await {
            Ok(text) => {
                self.store.store(&text)?;
                Ok(ManifestDocument {
                    text,
                    refreshed: true,
                })
            }
            Err(err) => match self.store.read_cached() {
                Some(text) => {
                    tracing::warn!("manifest refresh failed, using cached copy: {}", err);
                    Ok(ManifestDocument {
                        text,
                        refreshed: false,
                    })
                }
                None => Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use uuid::Uuid;

    fn temp_data_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("aurora-manifest-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp data directory");
        dir
    }

    fn files_for(dir: &Path) -> FileManager {
        FileManager::new(dir.to_path_buf(), dir.join("install"))
    }

    fn store_for(dir: &Path) -> TtlCacheStore {
        TtlCacheStore::new(
            dir.join(MANIFEST_FILE),
            dir.join(MANIFEST_STAMP_FILE),
            MANIFEST_TTL,
            files_for(dir),
        )
    }

    fn write_stamp(dir: &Path, age: Duration) {
        let fetched_at = chrono::Utc::now().timestamp_millis() - age.as_millis() as i64;
        std::fs::write(dir.join(MANIFEST_STAMP_FILE), fetched_at.to_string())
            .expect("write stamp");
    }

    #[test]
    fn cache_younger_than_ttl_is_fresh() {
        let dir = temp_data_dir();
        let store = store_for(&dir);
        std::fs::write(dir.join(MANIFEST_FILE), "payload").expect("write payload");
        write_stamp(&dir, Duration::from_secs(6 * 24 * 60 * 60 + 23 * 60 * 60));

        assert_eq!(store.read_fresh().as_deref(), Some("payload"));
    }

    #[test]
    fn cache_older_than_ttl_is_stale() {
        let dir = temp_data_dir();
        let store = store_for(&dir);
        std::fs::write(dir.join(MANIFEST_FILE), "payload").expect("write payload");
        write_stamp(&dir, Duration::from_secs(7 * 24 * 60 * 60 + 60 * 60));

        assert!(store.read_fresh().is_none());
        assert_eq!(store.read_cached().as_deref(), Some("payload"));
    }

    #[test]
    fn unparsable_stamp_means_stale() {
        let dir = temp_data_dir();
        let store = store_for(&dir);
        std::fs::write(dir.join(MANIFEST_FILE), "payload").expect("write payload");
        std::fs::write(dir.join(MANIFEST_STAMP_FILE), "not-a-number").expect("write stamp");

        assert!(store.read_fresh().is_none());
    }

    #[tokio::test]
    async fn fresh_cache_short_circuits_without_network() {
        let dir = temp_data_dir();
        // Unroutable endpoint: any network attempt would error out.
        let service = ManifestService::new(
            RemoteClient::new(),
            "http://127.0.0.1:1/manifest.yaml".to_string(),
            files_for(&dir),
        );
        std::fs::write(dir.join(MANIFEST_FILE), "cached payload").expect("write payload");
        write_stamp(&dir, Duration::from_secs(60));

        let doc = service.fetch_or_cached(false).await.expect("cached read");
        assert_eq!(doc.text, "cached payload");
        assert!(!doc.refreshed);
    }

    #[tokio::test]
    async fn stale_cache_survives_fetch_failure() {
        let dir = temp_data_dir();
        let service = ManifestService::new(
            RemoteClient::new(),
            "http://127.0.0.1:1/manifest.yaml".to_string(),
            files_for(&dir),
        );
        std::fs::write(dir.join(MANIFEST_FILE), "old payload").expect("write payload");
        write_stamp(&dir, Duration::from_secs(30 * 24 * 60 * 60));

        let doc = service.fetch_or_cached(false).await.expect("fallback read");
        assert_eq!(doc.text, "old payload");
        assert!(!doc.refreshed);
    }

    #[tokio::test]
    async fn no_cache_and_failed_fetch_propagates() {
        let dir = temp_data_dir();
        let service = ManifestService::new(
            RemoteClient::new(),
            "http://127.0.0.1:1/manifest.yaml".to_string(),
            files_for(&dir),
        );

        assert!(service.fetch_or_cached(false).await.is_err());
    }
}
