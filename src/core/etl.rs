use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Drives a pipeline through extract, transform and load, with optional
/// resource monitoring between the phases.
pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: Option<SystemMonitor>,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            monitor: None,
        }
    }

    pub fn new_with_monitoring(pipeline: P, monitoring: bool) -> Self {
        Self {
            pipeline,
            monitor: monitoring.then(|| SystemMonitor::new(true)),
        }
    }

    fn log_stats(&self, phase: &str) {
        if let Some(monitor) = self.monitor.as_ref() {
            monitor.log_stats(phase);
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting ETL process");
        self.log_stats("startup");

        tracing::info!("📡 Extracting data...");
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("📡 Extracted {} records", raw_data.len());
        self.log_stats("extract");

        tracing::info!("🔄 Transforming data...");
        let transformed = self.pipeline.transform(raw_data).await?;
        if transformed.degraded {
            tracing::warn!("🔶 Transformation degraded; loading original records");
        }
        tracing::info!("🔄 Transformed {} records", transformed.records.len());
        self.log_stats("transform");

        tracing::info!("💾 Loading data...");
        let output_path = self.pipeline.load(transformed).await?;
        tracing::info!("💾 Output saved to: {output_path}");
        self.log_stats("load");

        if let Some(monitor) = self.monitor.as_ref() {
            monitor.log_final_stats();
        }

        Ok(output_path)
    }
}
