use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

use crate::errors::{LauncherError, Result};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(6);
const USER_AGENT: &str = "Mozilla/5.0";

/// HTTP(S) fetcher shared by the catalog, manifest and self-update paths.
/// Redirects are followed, every request carries a fixed 30 second timeout,
/// and bodies can be buffered or streamed straight to disk.
#[derive(Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
}

impl Default for RemoteClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::Http(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Err(LauncherError::Http(format!("empty response from {}", url)));
        }
        Ok(text)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::Http(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }
        Ok(response.json::<T>().await?)
    }

    /// Streams `url` into `dest`, reporting `(downloaded, total)` after each
    /// chunk. A failed or non-2xx download removes the partial file.
    pub async fn download_to_file(
        &self,
        url: &str,
        dest: &Path,
        mut on_progress: impl FnMut(u64, Option<u64>),
    ) -> Result<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::Http(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let total = response.content_length();
        let mut downloaded: u64 = 0;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();

        let outcome: Result<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                downloaded += chunk.len() as u64;
                on_progress(downloaded, total);
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(err) = outcome {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(err);
        }
        Ok(())
    }
}
