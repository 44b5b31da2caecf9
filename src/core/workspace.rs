use crate::utils::error::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 單一圖層的暫存檔案，以圖層名稱命名避免互相衝突
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub raw_zip_path: PathBuf,
    pub extracted_dir: PathBuf,
    pub simplified_zip_path: PathBuf,
}

impl Workspace {
    pub fn new(root: &Path, layer_name: &str) -> Self {
        Self {
            raw_zip_path: root.join(format!("{}.zip", layer_name)),
            extracted_dir: root.join(layer_name),
            simplified_zip_path: root.join(format!("{}_simplified.zip", layer_name)),
        }
    }

    /// 刪除所有產物，已不存在的項目直接略過
    pub fn clean(&self) -> Result<()> {
        remove_file_if_exists(&self.raw_zip_path)?;
        remove_file_if_exists(&self.simplified_zip_path)?;
        match fs::remove_dir_all(&self.extracted_dir) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        Ok(())
    }

    pub fn is_clean(&self) -> bool {
        !self.raw_zip_path.exists()
            && !self.extracted_dir.exists()
            && !self.simplified_zip_path.exists()
    }
}

pub fn clean(root: &Path, layer_name: &str) -> Result<()> {
    Workspace::new(root, layer_name).clean()
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
