//! Minimal shapefile reader/writer.
//!
//! Only the `.shp`, `.shx` and `.dbf` components are rewritten. The `.prj`
//! (CRS), `.cpg` and any other sidecar files are left untouched.

pub mod dbf;
pub mod shp;

pub use dbf::{AttributeTable, FieldDef};
pub use shp::{Part, PolyShape, RawShape, Shape, ShapeType};

use crate::utils::error::{IngestError, Result};
use shp::ShpFile;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 一個 shapefile：幾何紀錄與屬性列一一對應
#[derive(Debug, Clone)]
pub struct ShapefileDataset {
    shp: ShpFile,
    attributes: AttributeTable,
}

impl ShapefileDataset {
    pub fn new(shape_type: ShapeType, attributes: AttributeTable) -> Self {
        Self {
            shp: ShpFile {
                shape_type,
                z_range: [0.0; 2],
                m_range: [0.0; 2],
                shapes: Vec::new(),
            },
            attributes,
        }
    }

    pub fn read(shp_path: &Path) -> Result<Self> {
        let shp_bytes = fs::read(shp_path).map_err(|e| file_error(shp_path, e))?;
        let dbf_path = sidecar(shp_path, "dbf");
        let dbf_bytes = fs::read(&dbf_path).map_err(|e| file_error(&dbf_path, e))?;

        let shp = ShpFile::parse(&shp_bytes).map_err(|e| with_file(e, shp_path))?;
        let attributes = AttributeTable::parse(&dbf_bytes).map_err(|e| with_file(e, &dbf_path))?;
        if shp.shapes.len() != attributes.len() {
            return Err(IngestError::ShapefileError {
                file: shp_path.display().to_string(),
                message: format!(
                    "{} geometry records but {} attribute rows",
                    shp.shapes.len(),
                    attributes.len()
                ),
            });
        }

        Ok(Self { shp, attributes })
    }

    /// 寫出 `.shp`、`.shx`、`.dbf`，覆蓋既有檔案
    pub fn write(&self, shp_path: &Path) -> Result<()> {
        let (shp, shx) = self.shp.encode();
        fs::write(shp_path, shp)?;
        fs::write(sidecar(shp_path, "shx"), shx)?;
        fs::write(sidecar(shp_path, "dbf"), self.attributes.to_bytes())?;
        Ok(())
    }

    pub fn push(&mut self, shape: Shape, values: &[&str]) -> Result<()> {
        self.attributes.push_row(values)?;
        self.shp.shapes.push(shape);
        Ok(())
    }

    pub fn shape_type(&self) -> ShapeType {
        self.shp.shape_type
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shp.shapes
    }

    pub fn shapes_mut(&mut self) -> &mut [Shape] {
        &mut self.shp.shapes
    }

    pub fn attributes(&self) -> &AttributeTable {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.shp.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shp.shapes.is_empty()
    }

    /// 移除 null/空幾何的紀錄（連同屬性列），回傳移除數量
    pub fn remove_empty(&mut self) -> usize {
        let keep: Vec<bool> = self.shp.shapes.iter().map(|s| !s.is_empty()).collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            self.shp.shapes.retain(|s| !s.is_empty());
            self.attributes.retain_rows(&keep);
        }
        removed
    }
}

/// 目錄下（含子目錄）所有 `.shp` 檔，依路徑排序
pub fn find_shapefiles(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && has_extension(entry.path(), "shp") {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

/// 同名的 sidecar 檔，副檔名大小寫跟隨 `.shp`
pub fn sidecar(shp_path: &Path, extension: &str) -> PathBuf {
    let upper = shp_path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.chars().all(|c| c.is_ascii_uppercase()));
    if upper {
        shp_path.with_extension(extension.to_ascii_uppercase())
    } else {
        shp_path.with_extension(extension)
    }
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn file_error(path: &Path, error: std::io::Error) -> IngestError {
    IngestError::ShapefileError {
        file: path.display().to_string(),
        message: error.to_string(),
    }
}

fn with_file(error: IngestError, path: &Path) -> IngestError {
    match error {
        IngestError::ShapefileError { message, .. } => IngestError::ShapefileError {
            file: path.display().to_string(),
            message,
        },
        other => other,
    }
}
