use crate::domain::model::{BatchResult, IngestResult, LayerOutcome, Stage};
use crate::domain::ports::ProgressReporter;
use crate::utils::error::IngestError;
use crate::utils::monitor::ResourceMonitor;

/// 以 tracing 事件輸出進度，可選擇附帶系統資源統計
pub struct TracingReporter {
    monitor: ResourceMonitor,
}

impl TracingReporter {
    pub fn new(monitor_enabled: bool) -> Self {
        Self {
            monitor: ResourceMonitor::new(monitor_enabled),
        }
    }
}

impl Default for TracingReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ProgressReporter for TracingReporter {
    fn batch_started(&self, layer_count: usize) {
        tracing::info!(layers = layer_count, "🚀 Starting layer ingestion");
    }

    fn stage_started(&self, layer: &str, stage: Stage) {
        tracing::info!(layer, stage = %stage, "▶️ {} {}", stage, layer);
    }

    fn layer_failed(&self, layer: &str, stage: Stage, error: &IngestError) {
        tracing::error!(layer, stage = %stage, "❌ Layer {} failed while {}: {}", layer, stage, error);
    }

    fn layer_finished(&self, result: &IngestResult) {
        match &result.outcome {
            LayerOutcome::Done => tracing::info!(
                layer = %result.layer_name,
                duration_ms = result.duration_ms,
                "✅ Layer {} done",
                result.layer_name
            ),
            LayerOutcome::Failed { stage, .. } => tracing::warn!(
                layer = %result.layer_name,
                stage = %stage,
                duration_ms = result.duration_ms,
                "⚠️ Layer {} recorded as failed",
                result.layer_name
            ),
        }
        self.monitor.log_layer(&result.layer_name);
    }

    fn batch_finished(&self, result: &BatchResult) {
        let failed = result.results.len() - result.done_count();
        if failed > 0 {
            tracing::warn!(
                status = result.status.as_str(),
                done = result.done_count(),
                failed,
                "⚠️ Batch finished with failed layers"
            );
        } else {
            tracing::info!(
                status = result.status.as_str(),
                done = result.done_count(),
                "🎉 Batch finished"
            );
        }
        self.monitor.log_summary();
    }
}
