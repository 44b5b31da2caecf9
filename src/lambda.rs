use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use layer_ingest::app::handler::API_KEY_SECRET;
use layer_ingest::utils::{logger, validation::Validate};
use layer_ingest::{Handler, HandlerResponse, LambdaConfig, LayerCatalog};
use std::collections::HashMap;

/// 固定專案：secrets 帶有 API key 時改寫入此專案
const SECRETS_PROJECT: &str = "discover";

async fn function_handler(event: LambdaEvent<serde_json::Value>) -> Result<HandlerResponse, Error> {
    tracing::info!(request_id = %event.context.request_id, "Starting layer ingestion");

    let config = match LambdaConfig::from_env().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration error: {}", e);
            return Ok(HandlerResponse::failed(e.to_string()));
        }
    };
    let client = match config.store_client() {
        Ok(client) => client,
        Err(e) => return Ok(HandlerResponse::failed(e.to_string())),
    };

    let secrets: Option<HashMap<String, String>> = std::env::var("STORE_API_KEY")
        .ok()
        .filter(|key| !key.is_empty())
        .map(|key| HashMap::from([(API_KEY_SECRET.to_string(), key)]));

    let handler = Handler::new(config, LayerCatalog::builtin(), SECRETS_PROJECT);
    let response = handler
        .handle(client, secrets.as_ref(), &event.payload)
        .await;

    tracing::info!(status = %response.status, "Layer ingestion finished");
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    run(service_fn(function_handler)).await
}
