pub mod archive;
pub mod catalog;
pub mod extractor;
pub mod fetcher;
pub mod orchestrator;
pub mod shapefile;
pub mod simplifier;
pub mod workspace;

pub use crate::domain::model::{BatchResult, IngestResult, LayerOutcome, LayerSpec, Stage};
pub use crate::domain::ports::{ConfigProvider, ProgressReporter, StorageSink, UploadOptions};
pub use crate::utils::error::Result;
