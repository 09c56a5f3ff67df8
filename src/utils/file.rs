use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

#[derive(Clone)]
pub struct FileManager {
    app_data_dir: PathBuf,
    install_dir: PathBuf,
}

impl FileManager {
    pub fn new(app_data_dir: PathBuf, install_dir: PathBuf) -> Self {
        Self {
            app_data_dir,
            install_dir,
        }
    }

    pub fn app_data_dir(&self) -> &Path {
        &self.app_data_dir
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    pub fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let temp_path = path.with_extension("tmp");
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&temp_path)?;
        use std::io::Write;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);
        fs::rename(temp_path, path)?;
        Ok(())
    }

    /// Reads a persisted JSON document, treating a missing or unparsable
    /// file as absent state rather than an error.
    pub fn load_json<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(
                    "discarding corrupt state file {}: {}",
                    path.display(),
                    err
                );
                None
            }
        }
    }
}
