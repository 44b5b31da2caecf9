pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{LambdaConfig, TomlConfig};

pub use adapters::reporter::TracingReporter;
pub use adapters::sink::{DirectorySink, StoreClient};
pub use app::handler::{Handler, HandlerResponse};
pub use core::catalog::LayerCatalog;
pub use core::orchestrator::IngestPipeline;
pub use domain::model::{BatchResult, BatchStatus, IngestResult, LayerOutcome, LayerSpec, Stage};
pub use utils::error::{IngestError, Result};
