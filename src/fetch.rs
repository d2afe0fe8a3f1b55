//! Image download to local disk.

use crate::constants::DOWNLOAD_TIMEOUT;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Downloads one image URL to a local path.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch `url` and write the bytes to `dest`.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// HTTP image fetcher.
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the standard download timeout.
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal {
                message: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::ImageDownload {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        if !response.status().is_success() {
            return Err(Error::ImageDownload {
                url: url.to_string(),
                source: format!("HTTP {}", response.status()).into(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await.map_err(Error::Io)?;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::ImageDownload {
                url: url.to_string(),
                source: Box::new(e),
            })?;
            file.write_all(&chunk).await.map_err(Error::Io)?;
        }

        file.flush().await.map_err(Error::Io)?;
        Ok(())
    }
}
