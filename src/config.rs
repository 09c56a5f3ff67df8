use std::path::PathBuf;

use crate::utils::paths;

const DEFAULT_CATALOG_VERSION_URL: &str = "https://data.aurora-launcher.app/catalog_version.json";
const DEFAULT_CATALOG_DATA_URL: &str = "https://data.aurora-launcher.app/catalog.json";
const DEFAULT_UPDATE_VERSION_URL: &str =
    "https://updates.aurora-launcher.app/launcher_version.json";
const DEFAULT_UPDATE_BUNDLE_URL: &str = "https://updates.aurora-launcher.app/aurora-launcher.zip";
const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/mtkennerly/ludusavi-manifest/master/data/manifest.yaml";

fn env_url(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Static wiring for the orchestration core. Built once by the shell and
/// handed to `AppState::initialize`; endpoints can be redirected per
/// environment through `AURORA_*` variables.
#[derive(Clone, Debug)]
pub struct LauncherConfig {
    /// App-private data directory (queue state, catalog, version files).
    pub data_dir: PathBuf,
    /// Directory holding the installed application, replaced on self-update.
    pub install_dir: PathBuf,
    pub catalog_version_url: String,
    pub catalog_data_url: String,
    pub update_version_url: String,
    pub update_bundle_url: String,
    pub manifest_url: String,
    /// Version of the running binary, used to seed the local update
    /// descriptor on first launch.
    pub app_version: String,
    /// False in development/unpackaged runs, which bypass self-update.
    pub packaged: bool,
}

impl LauncherConfig {
    /// Wiring for a real desktop build: platform-resolved data and install
    /// directories plus the default endpoints.
    pub fn from_env() -> Self {
        Self::new(paths::resolve_data_dir(), paths::resolve_install_dir())
    }

    pub fn new(data_dir: PathBuf, install_dir: PathBuf) -> Self {
        Self {
            data_dir,
            install_dir,
            catalog_version_url: env_url("AURORA_CATALOG_VERSION_URL", DEFAULT_CATALOG_VERSION_URL),
            catalog_data_url: env_url("AURORA_CATALOG_DATA_URL", DEFAULT_CATALOG_DATA_URL),
            update_version_url: env_url("AURORA_UPDATE_VERSION_URL", DEFAULT_UPDATE_VERSION_URL),
            update_bundle_url: env_url("AURORA_UPDATE_BUNDLE_URL", DEFAULT_UPDATE_BUNDLE_URL),
            manifest_url: env_url("AURORA_MANIFEST_URL", DEFAULT_MANIFEST_URL),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            packaged: !cfg!(debug_assertions),
        }
    }
}
