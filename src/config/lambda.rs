use crate::adapters::sink::StoreClient;
use crate::config::toml_config::{DEFAULT_PROJECT, DEFAULT_SOURCE_BASE_URL};
use crate::core::ConfigProvider;
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::{self, Validate};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const STORE_TIMEOUT_SECS: u64 = 300;

/// 從環境變數讀取的函式設定
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub source_base_url: String,
    pub workspace_root: String,
    pub store_url: String,
    pub store_project: String,
    pub store_api_key: Option<String>,
    pub simplify: bool,
    pub simplify_tolerance: f64,
    pub request_timeout: u64,
}

impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// `lookup` 回傳 None 代表未設定
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            source_base_url: lookup("SOURCE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SOURCE_BASE_URL.to_string()),
            workspace_root: lookup("WORKSPACE_ROOT").unwrap_or_else(|| "/tmp".to_string()),
            store_url: lookup("STORE_URL").ok_or_else(|| IngestError::MissingConfigError {
                field: "STORE_URL".to_string(),
            })?,
            store_project: lookup("STORE_PROJECT").unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
            store_api_key: lookup("STORE_API_KEY").filter(|key| !key.is_empty()),
            simplify: parse_or("SIMPLIFY", lookup("SIMPLIFY"), true)?,
            simplify_tolerance: parse_or("SIMPLIFY_TOLERANCE", lookup("SIMPLIFY_TOLERANCE"), 0.001)?,
            request_timeout: parse_or("REQUEST_TIMEOUT", lookup("REQUEST_TIMEOUT"), 120)?,
        })
    }

    pub fn store_client(&self) -> Result<StoreClient> {
        StoreClient::new(
            &self.store_url,
            &self.store_project,
            self.store_api_key.clone(),
            Duration::from_secs(STORE_TIMEOUT_SECS),
        )
    }
}

fn parse_or<T: FromStr>(field: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| IngestError::InvalidConfigValueError {
                field: field.to_string(),
                value,
                reason: "cannot be parsed".to_string(),
            }),
    }
}

impl ConfigProvider for LambdaConfig {
    fn source_base_url(&self) -> &str {
        &self.source_base_url
    }

    fn workspace_root(&self) -> &str {
        &self.workspace_root
    }

    fn request_timeout_secs(&self) -> u64 {
        self.request_timeout
    }

    fn simplify_enabled(&self) -> bool {
        self.simplify
    }

    fn simplify_tolerance(&self) -> f64 {
        self.simplify_tolerance
    }

    fn preserve_topology(&self) -> bool {
        true
    }
}

impl Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        // 來源與目的地
        validation::validate_url("SOURCE_BASE_URL", &self.source_base_url)?;
        validation::validate_url("STORE_URL", &self.store_url)?;
        validation::validate_non_empty_string("STORE_PROJECT", &self.store_project)?;

        validation::validate_path("WORKSPACE_ROOT", &self.workspace_root)?;
        validation::validate_range("SIMPLIFY_TOLERANCE", self.simplify_tolerance, 0.0, 1.0)?;
        validation::validate_positive_number("REQUEST_TIMEOUT", self.request_timeout as usize, 1)?;

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}
