use crate::domain::model::{BatchResult, IngestResult, Stage};
use crate::utils::error::{IngestError, Result};
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    pub create_layer: bool,
    pub replace_existing: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            create_layer: true,
            replace_existing: true,
        }
    }
}

/// 空間資料庫的上傳介面
///
/// 實作必須在圖層不存在時建立 schema，並以 `id_field` 取代既有 features，
/// 讓同一份封存檔重複上傳後的最終狀態不變。
#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn upload(
        &self,
        archive_path: &Path,
        layer_name: &str,
        id_field: &str,
        options: UploadOptions,
    ) -> Result<()>;
}

/// 進度回報介面，預設實作皆為 no-op
pub trait ProgressReporter: Send + Sync {
    fn batch_started(&self, _layer_count: usize) {}

    fn stage_started(&self, _layer: &str, _stage: Stage) {}

    fn layer_failed(&self, _layer: &str, _stage: Stage, _error: &IngestError) {}

    fn layer_finished(&self, _result: &IngestResult) {}

    fn batch_finished(&self, _result: &BatchResult) {}
}

pub trait ConfigProvider: Send + Sync {
    fn source_base_url(&self) -> &str;
    fn workspace_root(&self) -> &str;
    fn request_timeout_secs(&self) -> u64;
    fn simplify_enabled(&self) -> bool;
    fn simplify_tolerance(&self) -> f64;
    fn preserve_topology(&self) -> bool;
}
