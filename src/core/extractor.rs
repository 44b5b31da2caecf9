use crate::utils::error::{IngestError, Result};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use zip::ZipArchive;

/// 解壓縮整個封存檔到 `dest_dir`，目錄已存在不算錯誤
pub fn extract(zip_path: &Path, dest_dir: &Path) -> Result<usize> {
    fs::create_dir_all(dest_dir)?;

    let extract_error = |message: String| IngestError::ExtractError {
        path: zip_path.display().to_string(),
        message,
    };

    let file = File::open(zip_path).map_err(|e| extract_error(e.to_string()))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| extract_error(e.to_string()))?;
    let entries = archive.len();
    archive
        .extract(dest_dir)
        .map_err(|e| extract_error(e.to_string()))?;

    tracing::debug!(
        "Extracted {} entries from {} into {}",
        entries,
        zip_path.display(),
        dest_dir.display()
    );
    Ok(entries)
}
