use anyhow::Context;
use clap::Parser;
use layer_ingest::core::StorageSink;
use layer_ingest::utils::{logger, report, validation::Validate};
use layer_ingest::{
    BatchResult, CliConfig, DirectorySink, IngestPipeline, LayerCatalog, TomlConfig,
    TracingReporter,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);
    tracing::info!("🚀 Starting layer-ingest");

    let config = cli.load().context("failed to load configuration")?;
    if cli.verbose {
        tracing::debug!("Effective config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let catalog = if cli.layers.is_empty() {
        config.catalog()?
    } else {
        config.catalog()?.subset(&cli.layers)?
    };
    tracing::info!("📋 {} layer(s) selected", catalog.len());

    let batch = match cli.output_dir() {
        Some(dir) => {
            tracing::info!("📁 Publishing into local directory {}", dir.display());
            run(DirectorySink::new(dir), &config, &catalog, &cli).await?
        }
        None => {
            let client = config
                .store_client()
                .context("store.base_url (or --store-url) is required without --output-dir")?;
            tracing::info!("🌐 Publishing to project {}", client.project());
            run(client, &config, &catalog, &cli).await?
        }
    };

    if let Some(path) = &cli.report {
        report::write_report(&batch, path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        println!("📄 Report written to {}", path.display());
    }

    println!(
        "✅ {} of {} layer(s) ingested",
        batch.done_count(),
        batch.results.len()
    );
    for failure in batch.failures() {
        let stage = failure
            .failed_stage()
            .map(|s| s.to_string())
            .unwrap_or_default();
        eprintln!("❌ {} failed while {}", failure.layer_name, stage);
    }

    if cli.fail_on_layer_error && batch.has_failures() {
        std::process::exit(2);
    }
    Ok(())
}

async fn run<S: StorageSink>(
    sink: S,
    config: &TomlConfig,
    catalog: &LayerCatalog,
    cli: &CliConfig,
) -> anyhow::Result<BatchResult> {
    let reporter = Arc::new(TracingReporter::new(config.monitoring_enabled()));
    let pipeline = IngestPipeline::new(sink, config.clone())?.with_reporter(reporter);

    Ok(pipeline
        .ingest_all(catalog, config.simplify.enabled, cli.debug_skip)
        .await)
}
