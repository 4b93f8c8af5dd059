use crate::domain::model::{Record, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn api_endpoint(&self) -> &str;
    fn output_path(&self) -> &str;
    fn table_name(&self) -> &str;
    fn database_filename(&self) -> &str;
    fn max_retries(&self) -> u32;

    /// Total per-request timeout for the source API.
    fn timeout_seconds(&self) -> u64 {
        30
    }

    /// Pause between extraction attempts.
    fn retry_delay_ms(&self) -> u64 {
        500
    }

    fn dump_filename(&self) -> &str {
        "database_dump.sql"
    }

    /// Extra headers sent with every source API request.
    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Record>>;
    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
