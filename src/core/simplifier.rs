use crate::core::shapefile::{self, Part, PolyShape, Shape, ShapefileDataset};
use crate::utils::error::{IngestError, Result};
use geo::{Intersects, Line, LineString, SimplifyIdx, Winding};
use std::fs;
use std::path::Path;

/// 重寫後失效的空間索引
const STALE_INDEX_EXTENSIONS: &[&str] = &["sbn", "sbx", "qix"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplifyOptions {
    pub tolerance: f64,
    pub preserve_topology: bool,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.001,
            preserve_topology: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimplifyReport {
    pub files: usize,
    pub original_count: usize,
    pub removed_count: usize,
    pub retained_count: usize,
    pub vertices_before: usize,
    pub vertices_after: usize,
}

impl SimplifyReport {
    fn merge(&mut self, other: SimplifyReport) {
        self.files += other.files;
        self.original_count += other.original_count;
        self.removed_count += other.removed_count;
        self.retained_count += other.retained_count;
        self.vertices_before += other.vertices_before;
        self.vertices_after += other.vertices_after;
    }
}

/// 就地簡化 `dataset_dir` 下的每個 shapefile
pub fn simplify(dataset_dir: &Path, options: SimplifyOptions) -> Result<SimplifyReport> {
    let files = shapefile::find_shapefiles(dataset_dir)
        .map_err(|e| IngestError::simplify(format!("cannot scan {}: {}", dataset_dir.display(), e)))?;
    if files.is_empty() {
        return Err(IngestError::simplify(format!(
            "no shapefile found in {}",
            dataset_dir.display()
        )));
    }

    let mut report = SimplifyReport::default();
    for path in files {
        let mut dataset =
            ShapefileDataset::read(&path).map_err(|e| IngestError::simplify(e.to_string()))?;
        let file_report = simplify_dataset(&mut dataset, options).map_err(|e| match e {
            IngestError::SimplifyError { message } => {
                IngestError::simplify(format!("{}: {}", path.display(), message))
            }
            other => other,
        })?;
        dataset.write(&path)?;
        remove_stale_indexes(&path)?;

        tracing::debug!(
            "Simplified {}: {} -> {} features, {} -> {} vertices",
            path.display(),
            file_report.original_count,
            file_report.retained_count,
            file_report.vertices_before,
            file_report.vertices_after
        );
        report.merge(file_report);
    }
    Ok(report)
}

pub fn simplify_dataset(
    dataset: &mut ShapefileDataset,
    options: SimplifyOptions,
) -> Result<SimplifyReport> {
    let original_count = dataset.len();
    let removed_count = dataset.remove_empty();
    if dataset.is_empty() {
        return Err(IngestError::simplify(format!(
            "no geometries remain after removing {} null/empty records",
            removed_count
        )));
    }

    let mut vertices_before = 0;
    let mut vertices_after = 0;
    for shape in dataset.shapes_mut() {
        vertices_before += shape.vertex_count();
        if let Shape::Poly(poly) = shape {
            *poly = simplify_shape(poly, options);
        }
        vertices_after += shape.vertex_count();
    }

    Ok(SimplifyReport {
        files: 1,
        original_count,
        removed_count,
        retained_count: dataset.len(),
        vertices_before,
        vertices_after,
    })
}

/// Douglas-Peucker，逐 part 處理。保留拓撲時，會造成自交、
/// ring 方向翻轉或與同一 feature 其他 part 相交的 part 會還原。
pub fn simplify_shape(poly: &PolyShape, options: SimplifyOptions) -> PolyShape {
    let closed = poly.shape_type.is_polygon();
    let mut parts: Vec<Part> = poly
        .parts
        .iter()
        .map(|part| simplify_part(part, options.tolerance, closed))
        .collect();

    if options.preserve_topology {
        for (simplified, original) in parts.iter_mut().zip(&poly.parts) {
            if introduces_defect(original, simplified, closed) {
                *simplified = original.clone();
            }
        }
        while let Some(i) = find_new_crossing(&poly.parts, &parts) {
            parts[i] = poly.parts[i].clone();
        }
    }

    PolyShape {
        shape_type: poly.shape_type,
        parts,
    }
}

fn simplify_part(part: &Part, tolerance: f64, closed: bool) -> Part {
    if tolerance <= 0.0 || part.coords.len() < 3 {
        return part.clone();
    }
    let line = LineString::from(part.coords.clone());
    let indices = line.simplify_idx(&tolerance);

    // ring 至少四個頂點（含閉合點）
    if (closed && indices.len() < 4) || indices.len() >= part.coords.len() {
        return part.clone();
    }
    part.select(&indices)
}

fn introduces_defect(original: &Part, simplified: &Part, closed: bool) -> bool {
    if original == simplified {
        return false;
    }
    if closed {
        let before = LineString::from(original.coords.clone()).winding_order();
        let after = LineString::from(simplified.coords.clone()).winding_order();
        if after.is_none() || before != after {
            return true;
        }
    }
    has_self_intersection(&simplified.coords, closed) && !has_self_intersection(&original.coords, closed)
}

/// 回傳需要還原的 part 索引
fn find_new_crossing(original: &[Part], simplified: &[Part]) -> Option<usize> {
    for i in 0..simplified.len() {
        for j in (i + 1)..simplified.len() {
            let i_changed = simplified[i] != original[i];
            let j_changed = simplified[j] != original[j];
            if !i_changed && !j_changed {
                continue;
            }
            let crosses_now = line_string(&simplified[i]).intersects(&line_string(&simplified[j]));
            if crosses_now && !line_string(&original[i]).intersects(&line_string(&original[j])) {
                return Some(if i_changed { i } else { j });
            }
        }
    }
    None
}

fn line_string(part: &Part) -> LineString<f64> {
    LineString::from(part.coords.clone())
}

pub(crate) fn has_self_intersection(coords: &[geo::Coord<f64>], closed: bool) -> bool {
    let segments: Vec<Line<f64>> = coords.windows(2).map(|w| Line::new(w[0], w[1])).collect();
    let n = segments.len();
    let min_x = |l: &Line<f64>| l.start.x.min(l.end.x);
    let max_x = |l: &Line<f64>| l.start.x.max(l.end.x);

    // 依 x 起點排序，只比對 x 範圍重疊的線段
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| min_x(&segments[a]).total_cmp(&min_x(&segments[b])));

    for (k, &i) in order.iter().enumerate() {
        let reach = max_x(&segments[i]);
        for &j in &order[k + 1..] {
            if min_x(&segments[j]) > reach {
                break;
            }
            let (lo, hi) = (i.min(j), i.max(j));
            // 相鄰線段，以及閉合 ring 的首尾線段
            if hi - lo < 2 || (closed && lo == 0 && hi == n - 1) {
                continue;
            }
            if segments[i].intersects(&segments[j]) {
                return true;
            }
        }
    }
    false
}

fn remove_stale_indexes(shp_path: &Path) -> Result<()> {
    for extension in STALE_INDEX_EXTENSIONS {
        let path = shapefile::sidecar(shp_path, extension);
        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Removed stale index {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
