use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatusError { url: String, status: u16 },

    #[error("Failed to extract {path}: {message}")]
    ExtractError { path: String, message: String },

    #[error("Simplification failed: {message}")]
    SimplifyError { message: String },

    #[error("Malformed shapefile {file}: {message}")]
    ShapefileError { file: String, message: String },

    #[error("Packaging failed: {message}")]
    PackagingError { message: String },

    #[error("Upload of layer '{layer}' failed: {message}")]
    UploadError { layer: String, message: String },

    #[error("Catalog error: {message}")]
    CatalogError { message: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl IngestError {
    pub(crate) fn simplify(message: impl Into<String>) -> Self {
        Self::SimplifyError {
            message: message.into(),
        }
    }

    pub(crate) fn packaging(message: impl Into<String>) -> Self {
        Self::PackagingError {
            message: message.into(),
        }
    }

    pub(crate) fn catalog(message: impl Into<String>) -> Self {
        Self::CatalogError {
            message: message.into(),
        }
    }

    /// 網路類錯誤（傳輸失敗或非成功狀態碼）
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NetworkError(_) | Self::HttpStatusError { .. })
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
