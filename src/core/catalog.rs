use crate::domain::model::LayerSpec;
use crate::utils::error::{IngestError, Result};
use std::collections::HashSet;

/// (layer name, remote archive base name, id column)
const NPD_LAYERS: &[(&str, &str, &str)] = &[
    ("npd-fields", "fldArea", "fldNpdidField"),
    ("npd-discoveries", "dscArea", "dscNpdidDiscovery"),
    ("npd-licences", "prlArea", "prlNpdidLicence"),
    ("npd-blocks", "blkArea", ""),
    ("npd-quadrants", "qadArea", ""),
    ("npd-wellbores", "wlbPoint", "wlbNpdidWellbore"),
    ("npd-structural-elements", "strElement", ""),
    ("npd-facilities", "fclPoint", "fclNpdidFacility"),
    ("npd-pipelines", "pipLine", "pipNpdidPipe"),
];

/// 有序、唯讀的圖層目錄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerCatalog {
    layers: Vec<LayerSpec>,
}

impl LayerCatalog {
    /// 內建的 NPD 公開圖層
    pub fn builtin() -> Self {
        Self {
            layers: NPD_LAYERS
                .iter()
                .map(|(name, remote, id)| LayerSpec::new(name, remote, id))
                .collect(),
        }
    }

    pub fn from_specs(layers: Vec<LayerSpec>) -> Result<Self> {
        let mut seen = HashSet::new();
        for layer in &layers {
            validate_layer_name(&layer.name)?;
            if layer.remote_archive_base_name.trim().is_empty() {
                return Err(IngestError::catalog(format!(
                    "layer '{}' has no remote archive name",
                    layer.name
                )));
            }
            if !seen.insert(layer.name.as_str()) {
                return Err(IngestError::catalog(format!(
                    "duplicate layer name '{}'",
                    layer.name
                )));
            }
        }
        Ok(Self { layers })
    }

    /// 依名稱篩出子集，保持目錄原本的順序
    pub fn subset(&self, names: &[String]) -> Result<Self> {
        if let Some(unknown) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(IngestError::catalog(format!("unknown layer '{}'", unknown)));
        }
        Ok(Self {
            layers: self
                .layers
                .iter()
                .filter(|l| names.contains(&l.name))
                .cloned()
                .collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerSpec> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Default for LayerCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// 圖層名稱會直接用於工作區路徑
fn validate_layer_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(IngestError::catalog("layer name cannot be empty"));
    }
    if name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
        return Err(IngestError::catalog(format!(
            "layer name '{}' is not a valid path component",
            name
        )));
    }
    Ok(())
}
