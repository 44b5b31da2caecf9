use crate::domain::model::{BatchResult, LayerOutcome};
use crate::utils::error::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    layer: &'a str,
    status: &'a str,
    stage: &'a str,
    message: &'a str,
    started_at: String,
    duration_ms: u64,
}

/// 依副檔名輸出 `.json`，其餘一律寫成 CSV
pub fn write_report(batch: &BatchResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        fs::write(path, serde_json::to_string_pretty(batch)?)?;
    } else {
        fs::write(path, to_csv(batch)?)?;
    }

    tracing::debug!("Batch report written to {}", path.display());
    Ok(())
}

pub fn to_csv(batch: &BatchResult) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for result in &batch.results {
        let (status, stage, message) = match &result.outcome {
            LayerOutcome::Done => ("done", "", ""),
            LayerOutcome::Failed { stage, message } => ("failed", stage.as_str(), message.as_str()),
        };
        writer.serialize(ReportRow {
            layer: &result.layer_name,
            status,
            stage,
            message,
            started_at: result.started_at.to_rfc3339(),
            duration_ms: result.duration_ms,
        })?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
