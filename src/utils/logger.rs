use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn init_cli_logger(verbose: bool) {
    let filter = if verbose {
        env_filter("layer_ingest=debug,info")
    } else {
        env_filter("layer_ingest=info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .init();
}

/// Lambda 使用 JSON 格式，方便 CloudWatch 查詢欄位
pub fn init_lambda_logger() {
    tracing_subscriber::registry()
        .with(env_filter("layer_ingest=info"))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time()
                .json(),
        )
        .init();
}
