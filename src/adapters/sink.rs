use crate::domain::ports::{StorageSink, UploadOptions};
use crate::utils::error::{IngestError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 空間資料庫的 HTTP 客戶端
#[derive(Debug, Clone)]
pub struct StoreClient {
    client: Client,
    base_url: String,
    project: String,
    api_key: Option<String>,
}

impl StoreClient {
    pub fn new(
        base_url: &str,
        project: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            api_key,
        })
    }

    /// 以另一組憑證綁定到指定專案，沿用同一個連線池
    pub fn for_project(&self, project: &str, api_key: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            project: project.to_string(),
            api_key: Some(api_key),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn layer_url(&self, layer_name: &str) -> String {
        format!(
            "{}/api/v1/projects/{}/spatial/layers/{}/shapefile",
            self.base_url, self.project, layer_name
        )
    }
}

#[async_trait]
impl StorageSink for StoreClient {
    async fn upload(
        &self,
        archive_path: &Path,
        layer_name: &str,
        id_field: &str,
        options: UploadOptions,
    ) -> Result<()> {
        let upload_error = |message: String| IngestError::UploadError {
            layer: layer_name.to_string(),
            message,
        };

        let body = tokio::fs::read(archive_path)
            .await
            .map_err(|e| upload_error(format!("cannot read {}: {}", archive_path.display(), e)))?;

        let mut query = vec![
            ("createLayer", options.create_layer.to_string()),
            ("replaceExisting", options.replace_existing.to_string()),
        ];
        if !id_field.is_empty() {
            query.push(("idField", id_field.to_string()));
        }

        let url = self.layer_url(layer_name);
        tracing::debug!("POST {} ({} bytes)", url, body.len());
        let mut request = self
            .client
            .post(&url)
            .query(&query)
            .header(CONTENT_TYPE, "application/zip")
            .body(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| upload_error(format!("store unreachable: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(upload_error(format!(
                "store returned HTTP {}: {}",
                status.as_u16(),
                detail.trim()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayerMetadata {
    pub layer: String,
    pub id_field: String,
    pub archive_bytes: u64,
}

/// 把每個圖層存成 `{dir}/{layer}.zip` 與 `{dir}/{layer}.json`，重複上傳即取代
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn archive_path(&self, layer_name: &str) -> PathBuf {
        self.root.join(format!("{}.zip", layer_name))
    }

    pub fn metadata_path(&self, layer_name: &str) -> PathBuf {
        self.root.join(format!("{}.json", layer_name))
    }

    pub fn metadata(&self, layer_name: &str) -> Result<LayerMetadata> {
        let data = std::fs::read(self.metadata_path(layer_name))?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[async_trait]
impl StorageSink for DirectorySink {
    async fn upload(
        &self,
        archive_path: &Path,
        layer_name: &str,
        id_field: &str,
        options: UploadOptions,
    ) -> Result<()> {
        let upload_error = |message: String| IngestError::UploadError {
            layer: layer_name.to_string(),
            message,
        };

        let target = self.archive_path(layer_name);
        let exists = target.exists();
        if !exists && !options.create_layer {
            return Err(upload_error("layer does not exist".to_string()));
        }
        if exists && !options.replace_existing {
            return Err(upload_error("layer already has features".to_string()));
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let archive_bytes = tokio::fs::copy(archive_path, &target)
            .await
            .map_err(|e| upload_error(format!("cannot copy {}: {}", archive_path.display(), e)))?;

        let metadata = LayerMetadata {
            layer: layer_name.to_string(),
            id_field: id_field.to_string(),
            archive_bytes,
        };
        tokio::fs::write(
            self.metadata_path(layer_name),
            serde_json::to_vec_pretty(&metadata)?,
        )
        .await?;

        tracing::debug!("Stored layer {} at {}", layer_name, target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn archive(dir: &Path) -> PathBuf {
        let path = dir.join("npd-fields_simplified.zip");
        std::fs::write(&path, b"PK\x03\x04fake").unwrap();
        path
    }

    #[tokio::test]
    async fn test_store_client_posts_archive() {
        let temp_dir = TempDir::new().unwrap();
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/projects/discover/spatial/layers/npd-fields/shapefile")
                .query_param("idField", "fldNpdidField")
                .query_param("createLayer", "true")
                .query_param("replaceExisting", "true")
                .header("authorization", "Bearer secret")
                .header("content-type", "application/zip");
            then.status(200);
        });

        let client = StoreClient::new(
            &server.base_url(),
            "discover",
            Some("secret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        client
            .upload(
                &archive(temp_dir.path()),
                "npd-fields",
                "fldNpdidField",
                UploadOptions::default(),
            )
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn test_store_client_omits_empty_id_field() {
        let temp_dir = TempDir::new().unwrap();
        let server = MockServer::start();
        let with_id = server.mock(|when, then| {
            when.method(POST).query_param_exists("idField");
            then.status(500);
        });
        let without_id = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/projects/discover/spatial/layers/npd-blocks/shapefile");
            then.status(201);
        });

        let client =
            StoreClient::new(&server.base_url(), "discover", None, Duration::from_secs(5)).unwrap();
        client
            .upload(&archive(temp_dir.path()), "npd-blocks", "", UploadOptions::default())
            .await
            .unwrap();

        with_id.assert_hits(0);
        without_id.assert();
    }

    #[tokio::test]
    async fn test_store_rejection_is_upload_error() {
        let temp_dir = TempDir::new().unwrap();
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(403).body("forbidden");
        });

        let client =
            StoreClient::new(&server.base_url(), "discover", None, Duration::from_secs(5)).unwrap();
        let err = client
            .upload(&archive(temp_dir.path()), "npd-fields", "", UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::UploadError { .. }));
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn test_alternate_client_is_bound_to_project() {
        let client = StoreClient::new("https://store.example.com/", "default", None, Duration::from_secs(5))
            .unwrap();
        let alternate = client.for_project("discover", "key".to_string());
        assert_eq!(alternate.project(), "discover");
        assert_eq!(
            alternate.layer_url("npd-fields"),
            "https://store.example.com/api/v1/projects/discover/spatial/layers/npd-fields/shapefile"
        );
    }

    #[tokio::test]
    async fn test_directory_sink_replaces_layer() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(temp_dir.path().join("store"));
        let source = archive(temp_dir.path());

        sink.upload(&source, "npd-fields", "fldNpdidField", UploadOptions::default())
            .await
            .unwrap();
        sink.upload(&source, "npd-fields", "fldNpdidField", UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read(sink.archive_path("npd-fields")).unwrap(),
            std::fs::read(&source).unwrap()
        );
        let metadata = sink.metadata("npd-fields").unwrap();
        assert_eq!(metadata.id_field, "fldNpdidField");
    }

    #[tokio::test]
    async fn test_directory_sink_respects_options() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(temp_dir.path().join("store"));
        let source = archive(temp_dir.path());

        let no_create = UploadOptions {
            create_layer: false,
            replace_existing: true,
        };
        assert!(sink.upload(&source, "npd-fields", "", no_create).await.is_err());

        sink.upload(&source, "npd-fields", "", UploadOptions::default())
            .await
            .unwrap();
        let no_replace = UploadOptions {
            create_layer: true,
            replace_existing: false,
        };
        assert!(sink.upload(&source, "npd-fields", "", no_replace).await.is_err());
    }
}
