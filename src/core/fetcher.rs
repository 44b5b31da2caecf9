use crate::utils::error::{IngestError, Result};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// 下載來源封存檔，僅接受 2xx 回應，不重試
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// `{base}/{remote}.zip`
    pub fn archive_url(base_url: &str, remote_archive_base_name: &str) -> Result<String> {
        let url = format!(
            "{}/{}.zip",
            base_url.trim_end_matches('/'),
            remote_archive_base_name
        );
        Url::parse(&url).map_err(|e| IngestError::InvalidConfigValueError {
            field: "source.base_url".to_string(),
            value: url.clone(),
            reason: format!("Invalid archive URL: {}", e),
        })?;
        Ok(url)
    }

    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// 逐塊寫入目的檔，回傳寫入的位元組數
    pub async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.send(url).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!("Downloaded {} bytes from {} to {}", written, url, dest.display());
        Ok(written)
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        tracing::debug!("Response status: {}", status);
        if !status.is_success() {
            return Err(IngestError::HttpStatusError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}
