use crate::config::toml_config::TomlConfig;
use crate::utils::error::{IngestError, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

/// 命令列參數；有給的值覆蓋 TOML 設定
#[derive(Debug, Clone, Parser)]
#[command(name = "layer-ingest")]
#[command(about = "Download, simplify and publish zipped shapefile layers")]
pub struct CliConfig {
    /// Path to TOML configuration file (defaults are used when absent)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub source_base_url: Option<String>,

    #[arg(long)]
    pub workspace_dir: Option<String>,

    #[arg(long)]
    pub store_url: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    /// Publish into a local directory instead of the spatial store
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Only ingest these catalog layers, in catalog order
    #[arg(long, value_delimiter = ',')]
    pub layers: Vec<String>,

    #[arg(long)]
    pub tolerance: Option<f64>,

    #[arg(long, help = "Skip the simplification stage")]
    pub no_simplify: bool,

    #[arg(long, help = "Return immediately without processing any layer")]
    pub debug_skip: bool,

    /// Write a per-layer report (.csv or .json)
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[arg(long, help = "Exit with a non-zero code if any layer failed")]
    pub fail_on_layer_error: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process CPU and memory after each layer")]
    pub monitor: bool,
}

impl CliConfig {
    pub fn load(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path.display());
                TomlConfig::from_file(path)?
            }
            None => TomlConfig::default(),
        };
        self.apply_overrides(&mut config);
        self.check_output_dir(&config)?;
        Ok(config)
    }

    /// 輸出目錄與工作區根目錄相同時，`{layer}.zip` 會覆蓋下載檔並在清理時被刪除
    fn check_output_dir(&self, config: &TomlConfig) -> Result<()> {
        let Some(output_dir) = self.output_dir() else {
            return Ok(());
        };
        let resolve = |p: &Path| p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
        if resolve(output_dir) == resolve(Path::new(&config.workspace.root)) {
            return Err(IngestError::InvalidConfigValueError {
                field: "output_dir".to_string(),
                value: output_dir.display().to_string(),
                reason: "must differ from the workspace root".to_string(),
            });
        }
        Ok(())
    }

    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(url) = &self.source_base_url {
            config.source.base_url = url.clone();
        }
        if let Some(dir) = &self.workspace_dir {
            config.workspace.root = dir.clone();
        }
        if let Some(url) = &self.store_url {
            config.store.base_url = Some(url.clone());
        }
        if let Some(project) = &self.project {
            config.store.project = project.clone();
        }
        if let Some(tolerance) = self.tolerance {
            config.simplify.tolerance = tolerance;
        }
        if self.no_simplify {
            config.simplify.enabled = false;
        }
        if self.monitor {
            config.monitoring.enabled = true;
        }
        if config.api_key().is_none() {
            config.store.api_key = std::env::var("STORE_API_KEY").ok();
        }
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }
}
