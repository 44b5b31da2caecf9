#![allow(dead_code)]

use geo::Coord;
use layer_ingest::core::archive;
use layer_ingest::core::shapefile::{AttributeTable, FieldDef, Shape, ShapeType, ShapefileDataset};
use layer_ingest::TomlConfig;
use std::path::Path;
use tempfile::TempDir;

fn c(x: f64, y: f64) -> Coord<f64> {
    Coord { x, y }
}

/// 邊上帶鋸齒的方形，簡化後頂點數應明顯下降
pub fn jagged_square(x0: f64) -> Vec<Coord<f64>> {
    let mut ring = vec![c(x0, 0.0)];
    for i in 1..20 {
        let wobble = if i % 2 == 0 { 0.0002 } else { -0.0002 };
        ring.push(c(x0 + wobble, i as f64 / 20.0));
    }
    ring.extend([c(x0, 1.0), c(x0 + 1.0, 1.0), c(x0 + 1.0, 0.0), c(x0, 0.0)]);
    ring
}

/// `features` 筆多邊形，其中前 `nulls` 筆為 null geometry
pub fn polygon_dataset(features: usize, nulls: usize) -> ShapefileDataset {
    let table = AttributeTable::new(&[
        FieldDef::numeric("fldNpdidFi", 10, 0),
        FieldDef::character("fldName", 24),
    ])
    .unwrap();
    let mut dataset = ShapefileDataset::new(ShapeType::Polygon, table);
    for i in 0..features {
        let shape = if i < nulls {
            Shape::Null
        } else {
            Shape::polygon(vec![jagged_square(i as f64 * 2.0)])
        };
        let id = (43000 + i).to_string();
        let name = format!("FIELD {}", i);
        dataset.push(shape, &[&id, &name]).unwrap();
    }
    dataset
}

/// 以 `{base_name}.shp/.shx/.dbf/.prj` 組成的 zip 位元組
pub fn zipped_layer(base_name: &str, dataset: &ShapefileDataset) -> Vec<u8> {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("src");
    std::fs::create_dir_all(&source).unwrap();
    dataset.write(&source.join(format!("{}.shp", base_name))).unwrap();
    std::fs::write(
        source.join(format!("{}.prj", base_name)),
        b"GEOGCS[\"ED50\",DATUM[\"D_European_1950\"]]",
    )
    .unwrap();

    let zip_path = temp_dir.path().join("layer.zip");
    archive::build(&source, &zip_path).unwrap();
    std::fs::read(zip_path).unwrap()
}

pub fn config(source_base_url: &str, workspace_root: &Path) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.source.base_url = source_base_url.to_string();
    config.source.timeout_seconds = 10;
    config.workspace.root = workspace_root.to_str().unwrap().to_string();
    config
}

pub fn read_zipped_dataset(zip_path: &Path, shp_name: &str) -> ShapefileDataset {
    let temp_dir = TempDir::new().unwrap();
    let file = std::fs::File::open(zip_path).unwrap();
    zip::ZipArchive::new(file)
        .unwrap()
        .extract(temp_dir.path())
        .unwrap();
    ShapefileDataset::read(&temp_dir.path().join(shp_name)).unwrap()
}

/// 直接以給定的路徑與內容組 zip，用來製造異常封存檔
pub fn zip_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
