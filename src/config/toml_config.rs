use crate::adapters::sink::StoreClient;
use crate::core::catalog::LayerCatalog;
use crate::core::ConfigProvider;
use crate::domain::model::LayerSpec;
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SOURCE_BASE_URL: &str = "https://factpages.npd.no/downloads/shape";
pub const DEFAULT_PROJECT: &str = "discover";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub source: SourceConfig,
    pub workspace: WorkspaceConfig,
    pub simplify: SimplifyConfig,
    pub store: StoreConfig,
    pub monitoring: MonitoringConfig,
    pub layers: Vec<LayerSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SOURCE_BASE_URL.to_string(),
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub root: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyConfig {
    pub enabled: bool,
    pub tolerance: f64,
    pub preserve_topology: bool,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance: 0.001,
            preserve_topology: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub base_url: Option<String>,
    pub project: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            project: DEFAULT_PROJECT.to_string(),
            api_key: None,
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| IngestError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${STORE_API_KEY})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| IngestError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// `[[layers]]` 有設定時取代內建目錄
    pub fn catalog(&self) -> Result<LayerCatalog> {
        if self.layers.is_empty() {
            Ok(LayerCatalog::builtin())
        } else {
            LayerCatalog::from_specs(self.layers.clone())
        }
    }

    /// 未替換的 `${VAR}` 視為未設定
    pub fn api_key(&self) -> Option<String> {
        self.store
            .api_key
            .as_ref()
            .filter(|key| !key.is_empty() && !key.starts_with("${"))
            .cloned()
    }

    pub fn store_client(&self) -> Result<StoreClient> {
        let base_url = validation::validate_required_field("store.base_url", &self.store.base_url)?;
        StoreClient::new(
            base_url,
            &self.store.project,
            self.api_key(),
            Duration::from_secs(self.store.timeout_seconds),
        )
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }
}

impl ConfigProvider for TomlConfig {
    fn source_base_url(&self) -> &str {
        &self.source.base_url
    }

    fn workspace_root(&self) -> &str {
        &self.workspace.root
    }

    fn request_timeout_secs(&self) -> u64 {
        self.source.timeout_seconds
    }

    fn simplify_enabled(&self) -> bool {
        self.simplify.enabled
    }

    fn simplify_tolerance(&self) -> f64 {
        self.simplify.tolerance
    }

    fn preserve_topology(&self) -> bool {
        self.simplify.preserve_topology
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("source.base_url", &self.source.base_url)?;
        validation::validate_positive_number(
            "source.timeout_seconds",
            self.source.timeout_seconds as usize,
            1,
        )?;
        validation::validate_path("workspace.root", &self.workspace.root)?;
        validation::validate_range("simplify.tolerance", self.simplify.tolerance, 0.0, 1.0)?;

        if let Some(base_url) = &self.store.base_url {
            validation::validate_url("store.base_url", base_url)?;
        }
        validation::validate_non_empty_string("store.project", &self.store.project)?;

        self.catalog()?;
        Ok(())
    }
}
