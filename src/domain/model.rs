use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 一個圖層的來源描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    pub remote_archive_base_name: String,
    /// 空字串代表不強制識別欄位
    #[serde(default)]
    pub id_column: String,
}

impl LayerSpec {
    pub fn new(name: &str, remote_archive_base_name: &str, id_column: &str) -> Self {
        Self {
            name: name.to_string(),
            remote_archive_base_name: remote_archive_base_name.to_string(),
            id_column: id_column.to_string(),
        }
    }
}

/// 單一圖層管線的狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Downloading,
    Extracting,
    Simplifying,
    Packaging,
    Uploading,
    Cleaning,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Downloading => "downloading",
            Stage::Extracting => "extracting",
            Stage::Simplifying => "simplifying",
            Stage::Packaging => "packaging",
            Stage::Uploading => "uploading",
            Stage::Cleaning => "cleaning",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LayerOutcome {
    Done,
    Failed { stage: Stage, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub layer_name: String,
    #[serde(flatten)]
    pub outcome: LayerOutcome,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl IngestResult {
    pub fn is_done(&self) -> bool {
        matches!(self.outcome, LayerOutcome::Done)
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match &self.outcome {
            LayerOutcome::Done => None,
            LayerOutcome::Failed { stage, .. } => Some(*stage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Succeeded,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Succeeded => "succeeded",
            BatchStatus::Failed => "failed",
        }
    }
}

/// 整批執行結果
///
/// 單一圖層失敗不會讓 `status` 變成 `Failed`，只有批次迴圈外的錯誤才會。
/// 需要偵測部分失敗的呼叫端請使用 [`BatchResult::has_failures`]。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub results: Vec<IngestResult>,
}

impl BatchResult {
    pub fn succeeded(results: Vec<IngestResult>) -> Self {
        Self {
            status: BatchStatus::Succeeded,
            error: None,
            results,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: BatchStatus::Failed,
            error: Some(error.into()),
            results: Vec::new(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &IngestResult> {
        self.results.iter().filter(|r| !r.is_done())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn done_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_done()).count()
    }
}
