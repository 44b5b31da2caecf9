use crate::utils::error::{IngestError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, DateTime};

/// 將 `source_dir` 底下所有檔案以檔名（不含路徑）打包成 zip
///
/// shapefile 解壓後是單層結構，所以攤平不會遺失資訊；若不同子目錄出現同名檔案，
/// 回傳 `PackagingError` 而不是默默覆蓋。
pub fn build(source_dir: &Path, output_zip_path: &Path) -> Result<usize> {
    let mut files = Vec::new();
    collect_files(source_dir, &mut files).map_err(|e| {
        IngestError::packaging(format!("cannot walk {}: {}", source_dir.display(), e))
    })?;
    files.sort();

    let mut seen: HashMap<String, &PathBuf> = HashMap::new();
    for path in &files {
        let name = entry_name(path)?;
        if let Some(previous) = seen.insert(name.clone(), path) {
            return Err(IngestError::packaging(format!(
                "entry name '{}' collides: {} and {}",
                name,
                previous.display(),
                path.display()
            )));
        }
    }

    write_zip(&files, output_zip_path).map_err(|e| {
        IngestError::packaging(format!("cannot write {}: {}", output_zip_path.display(), e))
    })?;

    tracing::debug!(
        "Packed {} files from {} into {}",
        files.len(),
        source_dir.display(),
        output_zip_path.display()
    );
    Ok(files.len())
}

fn write_zip(files: &[PathBuf], output_zip_path: &Path) -> Result<()> {
    // 固定時間戳，資料不變時輸出位元組相同
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut zip = ZipWriter::new(BufWriter::new(File::create(output_zip_path)?));
    for path in files {
        zip.start_file(entry_name(path)?, options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}

fn entry_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::packaging(format!("invalid file name {}", path.display())))
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn names(zip_path: &Path) -> Vec<String> {
        let mut archive = ZipArchive::new(File::open(zip_path).unwrap()).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_build_flattens_by_base_name() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("npd-fields");
        fs::create_dir_all(src.join("fldArea")).unwrap();
        fs::write(src.join("fldArea/fldArea.shp"), b"shp").unwrap();
        fs::write(src.join("fldArea.prj"), b"prj").unwrap();
        let out = temp_dir.path().join("npd-fields_simplified.zip");

        let count = build(&src, &out).unwrap();

        assert_eq!(count, 2);
        assert_eq!(names(&out), vec!["fldArea.prj", "fldArea.shp"]);
    }

    #[test]
    fn test_name_collision_is_packaging_error() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("layer");
        fs::create_dir_all(src.join("a")).unwrap();
        fs::create_dir_all(src.join("b")).unwrap();
        fs::write(src.join("a/x.dbf"), b"1").unwrap();
        fs::write(src.join("b/x.dbf"), b"2").unwrap();

        let err = build(&src, &temp_dir.path().join("out.zip")).unwrap_err();
        assert!(matches!(err, IngestError::PackagingError { .. }));
    }

    #[test]
    fn test_build_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("layer");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.shp"), vec![1u8; 512]).unwrap();
        fs::write(src.join("a.dbf"), vec![2u8; 128]).unwrap();

        let first = temp_dir.path().join("first.zip");
        let second = temp_dir.path().join("second.zip");
        build(&src, &first).unwrap();
        build(&src, &second).unwrap();

        assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
    }

    #[test]
    fn test_missing_source_is_packaging_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = build(&temp_dir.path().join("nope"), &temp_dir.path().join("out.zip"))
            .unwrap_err();
        assert!(matches!(err, IngestError::PackagingError { .. }));
    }
}
