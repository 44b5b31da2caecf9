use crate::adapters::reporter::TracingReporter;
use crate::adapters::sink::StoreClient;
use crate::core::catalog::LayerCatalog;
use crate::core::orchestrator::IngestPipeline;
use crate::domain::model::BatchResult;
use crate::domain::ports::{ConfigProvider, ProgressReporter};
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// secrets 中帶 API key 的鍵名
pub const API_KEY_SECRET: &str = "api-key";

/// 呼叫端看到的結果，只有批次迴圈外的錯誤才會是 `failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HandlerResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: "failed".to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

impl From<&BatchResult> for HandlerResponse {
    fn from(batch: &BatchResult) -> Self {
        Self {
            status: batch.status.as_str().to_string(),
            error: batch.error.clone(),
        }
    }
}

/// 請求內容；旗標沿用字串 `"True"` 的慣例
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RequestPayload {
    pub debug: Option<String>,
    pub simplify: Option<String>,
    pub layers: Option<Vec<String>>,
}

impl RequestPayload {
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn debug_skip(&self) -> bool {
        self.debug.as_deref() == Some("True")
    }

    /// 只有 `"False"` 會關閉簡化
    pub fn simplify(&self) -> Option<bool> {
        self.simplify.as_deref().map(|s| s != "False")
    }
}

pub struct Handler<C: ConfigProvider + Clone> {
    config: C,
    catalog: LayerCatalog,
    project: String,
    reporter: Arc<dyn ProgressReporter>,
}

impl<C: ConfigProvider + Clone> Handler<C> {
    /// `project` 是以 secrets 中 API key 建立替代客戶端時綁定的固定專案
    pub fn new(config: C, catalog: LayerCatalog, project: &str) -> Self {
        Self {
            config,
            catalog,
            project: project.to_string(),
            reporter: Arc::new(TracingReporter::default()),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// 所有錯誤都轉成 `{status: "failed", error}`，不會往外拋
    pub async fn handle(
        &self,
        client: StoreClient,
        secrets: Option<&HashMap<String, String>>,
        payload: &serde_json::Value,
    ) -> HandlerResponse {
        match self.run(client, secrets, payload).await {
            Ok(batch) => {
                for failure in batch.failures() {
                    tracing::warn!(
                        layer = %failure.layer_name,
                        stage = ?failure.failed_stage(),
                        "Layer failed but batch continues"
                    );
                }
                HandlerResponse::from(&batch)
            }
            Err(e) => {
                tracing::error!("❌ Ingestion failed before processing layers: {}", e);
                HandlerResponse::failed(e.to_string())
            }
        }
    }

    pub async fn run(
        &self,
        client: StoreClient,
        secrets: Option<&HashMap<String, String>>,
        payload: &serde_json::Value,
    ) -> Result<BatchResult> {
        let request = RequestPayload::from_value(payload)?;

        let api_key = secrets
            .and_then(|s| s.get(API_KEY_SECRET))
            .filter(|key| !key.is_empty());
        let client = match api_key {
            Some(key) => {
                tracing::info!("🔑 Using API key from secrets for project {}", self.project);
                client.for_project(&self.project, key.clone())
            }
            None => client,
        };

        let catalog = match &request.layers {
            Some(names) => self.catalog.subset(names)?,
            None => self.catalog.clone(),
        };
        let simplify = request
            .simplify()
            .unwrap_or_else(|| self.config.simplify_enabled());

        let pipeline =
            IngestPipeline::new(client, self.config.clone())?.with_reporter(self.reporter.clone());
        Ok(pipeline
            .ingest_all(&catalog, simplify, request.debug_skip())
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_flags() {
        let payload = RequestPayload::from_value(&json!({"debug": "True"})).unwrap();
        assert!(payload.debug_skip());
        assert_eq!(payload.simplify(), None);

        let payload = RequestPayload::from_value(&json!({"debug": "true", "simplify": "False"}))
            .unwrap();
        assert!(!payload.debug_skip());
        assert_eq!(payload.simplify(), Some(false));

        for value in ["True", "true", "yes"] {
            let payload = RequestPayload::from_value(&json!({ "simplify": value })).unwrap();
            assert_eq!(payload.simplify(), Some(true), "simplify = {}", value);
        }

        let payload = RequestPayload::from_value(&serde_json::Value::Null).unwrap();
        assert!(!payload.debug_skip());
        assert!(payload.layers.is_none());
    }

    #[test]
    fn test_invalid_payload_is_error() {
        assert!(RequestPayload::from_value(&json!({"layers": "npd-fields"})).is_err());
    }

    #[test]
    fn test_response_serialization_omits_empty_error() {
        let ok = HandlerResponse::from(&BatchResult::succeeded(vec![]));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"status": "succeeded"}));

        let failed = HandlerResponse::failed("boom");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"status": "failed", "error": "boom"})
        );
    }
}
