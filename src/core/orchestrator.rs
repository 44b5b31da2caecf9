use crate::adapters::reporter::TracingReporter;
use crate::core::catalog::LayerCatalog;
use crate::core::fetcher::Fetcher;
use crate::core::simplifier::SimplifyOptions;
use crate::core::workspace::Workspace;
use crate::core::{archive, extractor, simplifier};
use crate::domain::model::{BatchResult, IngestResult, LayerOutcome, LayerSpec, Stage};
use crate::domain::ports::{ConfigProvider, ProgressReporter, StorageSink, UploadOptions};
use crate::utils::error::{IngestError, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct StageFailure {
    stage: Stage,
    error: IngestError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageFailure>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageFailure> {
        self.map_err(|error| StageFailure { stage, error })
    }
}

/// 逐一處理目錄中的圖層：下載 → 解壓 → 簡化 → 打包 → 上傳 → 清理
///
/// 每個圖層的錯誤都在圖層邊界攔截並記錄，不會中斷整批。
pub struct IngestPipeline<S: StorageSink, C: ConfigProvider> {
    sink: S,
    config: C,
    fetcher: Fetcher,
    reporter: Arc<dyn ProgressReporter>,
    upload_options: UploadOptions,
}

impl<S: StorageSink, C: ConfigProvider> IngestPipeline<S, C> {
    pub fn new(sink: S, config: C) -> Result<Self> {
        let fetcher = Fetcher::new(Duration::from_secs(config.request_timeout_secs()))?;
        Ok(Self {
            sink,
            config,
            fetcher,
            reporter: Arc::new(TracingReporter::default()),
            upload_options: UploadOptions::default(),
        })
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_upload_options(mut self, options: UploadOptions) -> Self {
        self.upload_options = options;
        self
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    fn workspace_root(&self) -> PathBuf {
        PathBuf::from(self.config.workspace_root())
    }

    fn simplify_options(&self) -> SimplifyOptions {
        SimplifyOptions {
            tolerance: self.config.simplify_tolerance(),
            preserve_topology: self.config.preserve_topology(),
        }
    }

    /// `debug_skip` 只在開始前檢查一次，設定時不做任何網路或檔案操作
    pub async fn ingest_all(
        &self,
        catalog: &LayerCatalog,
        simplify: bool,
        debug_skip: bool,
    ) -> BatchResult {
        if debug_skip {
            tracing::info!("🔍 Debug skip enabled, no layers will be processed");
            return BatchResult::succeeded(Vec::new());
        }

        self.reporter.batch_started(catalog.len());
        let mut results = Vec::with_capacity(catalog.len());
        for layer in catalog.iter() {
            results.push(self.ingest_layer(layer, simplify).await);
        }

        let batch = BatchResult::succeeded(results);
        self.reporter.batch_finished(&batch);
        batch
    }

    pub async fn ingest_layer(&self, layer: &LayerSpec, simplify: bool) -> IngestResult {
        let started_at = Utc::now();
        let timer = Instant::now();
        let workspace = Workspace::new(&self.workspace_root(), &layer.name);
        self.reporter.stage_started(&layer.name, Stage::Pending);

        let stages = self.run_stages(layer, &workspace, simplify).await;
        if let Err(failure) = &stages {
            self.reporter
                .layer_failed(&layer.name, failure.stage, &failure.error);
        }

        // 無論成敗都要清理
        self.reporter.stage_started(&layer.name, Stage::Cleaning);
        let cleanup = workspace.clean();

        let outcome = match (stages, cleanup) {
            (Ok(()), Ok(())) => LayerOutcome::Done,
            (Ok(()), Err(error)) => {
                self.reporter.layer_failed(&layer.name, Stage::Cleaning, &error);
                LayerOutcome::Failed {
                    stage: Stage::Cleaning,
                    message: error.to_string(),
                }
            }
            (Err(failure), cleanup) => {
                if let Err(error) = cleanup {
                    tracing::warn!(
                        layer = %layer.name,
                        "Cleanup after failed layer also failed: {}",
                        error
                    );
                }
                LayerOutcome::Failed {
                    stage: failure.stage,
                    message: failure.error.to_string(),
                }
            }
        };
        if matches!(outcome, LayerOutcome::Done) {
            self.reporter.stage_started(&layer.name, Stage::Done);
        }

        let result = IngestResult {
            layer_name: layer.name.clone(),
            outcome,
            started_at,
            duration_ms: timer.elapsed().as_millis() as u64,
        };
        self.reporter.layer_finished(&result);
        result
    }

    async fn run_stages(
        &self,
        layer: &LayerSpec,
        workspace: &Workspace,
        simplify: bool,
    ) -> std::result::Result<(), StageFailure> {
        self.reporter.stage_started(&layer.name, Stage::Downloading);
        let url = Fetcher::archive_url(
            self.config.source_base_url(),
            &layer.remote_archive_base_name,
        )
        .at(Stage::Downloading)?;
        if let Some(parent) = workspace.raw_zip_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(IngestError::from)
                .at(Stage::Downloading)?;
        }
        self.fetcher
            .fetch_to_file(&url, &workspace.raw_zip_path)
            .await
            .at(Stage::Downloading)?;

        self.reporter.stage_started(&layer.name, Stage::Extracting);
        extractor::extract(&workspace.raw_zip_path, &workspace.extracted_dir)
            .at(Stage::Extracting)?;

        if simplify {
            self.reporter.stage_started(&layer.name, Stage::Simplifying);
            let dir = workspace.extracted_dir.clone();
            let options = self.simplify_options();
            let report = tokio::task::spawn_blocking(move || simplifier::simplify(&dir, options))
                .await
                .map_err(|e| IngestError::simplify(format!("simplify task failed: {}", e)))
                .and_then(|r| r)
                .at(Stage::Simplifying)?;
            tracing::info!(
                layer = %layer.name,
                "Simplified {} -> {} features ({} null/empty removed), {} -> {} vertices",
                report.original_count,
                report.retained_count,
                report.removed_count,
                report.vertices_before,
                report.vertices_after
            );
        }

        self.reporter.stage_started(&layer.name, Stage::Packaging);
        archive::build(&workspace.extracted_dir, &workspace.simplified_zip_path)
            .at(Stage::Packaging)?;

        self.reporter.stage_started(&layer.name, Stage::Uploading);
        self.sink
            .upload(
                &workspace.simplified_zip_path,
                &layer.name,
                &layer.id_column,
                self.upload_options,
            )
            .await
            .at(Stage::Uploading)?;

        Ok(())
    }
}
