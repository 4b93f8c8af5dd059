use crate::core::{ConfigProvider, Pipeline, Record, Storage, TransformResult};
use crate::load;
use crate::transform::Transformer;
use crate::utils::error::{EtlError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// The batch pipeline: pull transactions from the source API, run the
/// transformation core, and load the result into CSV/JSON/ZIP/SQLite sinks.
pub struct TransactionPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    client: Client,
    transformer: Transformer,
    clean_only: bool,
}

impl<S: Storage, C: ConfigProvider> TransactionPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        let client = Self::build_client(&config);
        Self {
            storage,
            config,
            client,
            transformer: Transformer::new(),
            clean_only: false,
        }
    }

    fn build_client(config: &C) -> Client {
        let mut headers = HeaderMap::new();
        for (name, value) in config.headers() {
            match (
                name.parse::<HeaderName>(),
                value.parse::<HeaderValue>(),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!("🔶 Ignoring invalid request header: {name}"),
            }
        }

        Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds()))
            .default_headers(headers)
            .build()
            .unwrap_or_else(|error| {
                tracing::warn!("🔶 Falling back to default HTTP client: {error}");
                Client::new()
            })
    }

    /// Restrict the transform stage to cleaning and id-dedup; no category
    /// enrichment or feature derivation.
    pub fn clean_only(mut self, clean_only: bool) -> Self {
        self.clean_only = clean_only;
        self
    }

    fn parse_response(json_data: serde_json::Value) -> Vec<Record> {
        match json_data {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::Object(obj) => Some(Record::from_object(obj)),
                    _ => None,
                })
                .collect(),
            serde_json::Value::Object(obj) => vec![Record::from_object(obj)],
            _ => Vec::new(),
        }
    }

    async fn fetch_once(&self) -> Result<Vec<Record>> {
        let response = self.client.get(self.config.api_endpoint()).send().await?;
        tracing::debug!("📡 API response status: {}", response.status());

        if !response.status().is_success() {
            return Err(EtlError::ProcessingError {
                message: format!(
                    "API request to {} returned status {}",
                    self.config.api_endpoint(),
                    response.status()
                ),
            });
        }

        let json_data: serde_json::Value = response.json().await?;
        Ok(Self::parse_response(json_data))
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for TransactionPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        let max_retries = self.config.max_retries().max(1);

        let mut last_error = None;
        for attempt in 1..=max_retries {
            tracing::debug!(
                "📡 Fetching {} (attempt {attempt}/{max_retries})",
                self.config.api_endpoint()
            );
            match self.fetch_once().await {
                Ok(records) => {
                    tracing::info!("📡 Extracted {} records", records.len());
                    return Ok(records);
                }
                Err(error) => {
                    tracing::warn!("🔶 Extraction attempt {attempt} failed: {error}");
                    last_error = Some(error);
                    if attempt < max_retries {
                        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms()))
                            .await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(EtlError::ProcessingError {
            message: "extraction failed with no attempts made".to_string(),
        }))
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let outcome = if self.clean_only {
            self.transformer.clean_records(data)
        } else {
            self.transformer.transform_records(data)
        };

        let columns: BTreeSet<String> = outcome
            .records
            .iter()
            .flat_map(|record| record.data.keys().cloned())
            .collect();

        let degraded = !outcome.succeeded();
        Ok(TransformResult {
            records: outcome.records,
            columns: columns.into_iter().collect(),
            degraded,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let zip_data = load::build_zip_bundle(&result)?;
        tracing::debug!("💾 Writing ZIP bundle ({} bytes) to storage", zip_data.len());
        self.storage
            .write_file("processed_transactions.zip", &zip_data)
            .await?;

        let db_path = Path::new(self.config.output_path()).join(self.config.database_filename());
        load::sqlite::save_to_database(&db_path, self.config.table_name(), &result)?;

        let dump = load::sqlite::dump_database(&db_path)?;
        self.storage
            .write_file(self.config.dump_filename(), dump.as_bytes())
            .await?;

        let output_path = format!(
            "{}/processed_transactions.zip",
            self.config.output_path()
        );
        tracing::info!("💾 Load completed: {output_path}");
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        api_endpoint: String,
        output_path: String,
        table_name: String,
        database_filename: String,
        max_retries: u32,
        timeout_seconds: u64,
        retry_delay_ms: u64,
        headers: Vec<(String, String)>,
    }

    impl MockConfig {
        fn new(api_endpoint: String) -> Self {
            Self {
                api_endpoint,
                output_path: "test_output".to_string(),
                table_name: "accounts".to_string(),
                database_filename: "etl_results.sqlite".to_string(),
                max_retries: 1,
                timeout_seconds: 30,
                retry_delay_ms: 10,
                headers: Vec::new(),
            }
        }

        fn with_output_path(mut self, output_path: &str) -> Self {
            self.output_path = output_path.to_string();
            self
        }

        fn with_max_retries(mut self, max_retries: u32) -> Self {
            self.max_retries = max_retries;
            self
        }

        fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
            self.timeout_seconds = timeout_seconds;
            self
        }

        fn with_header(mut self, name: &str, value: &str) -> Self {
            self.headers.push((name.to_string(), value.to_string()));
            self
        }
    }

    impl ConfigProvider for MockConfig {
        fn api_endpoint(&self) -> &str {
            &self.api_endpoint
        }

        fn output_path(&self) -> &str {
            &self.output_path
        }

        fn table_name(&self) -> &str {
            &self.table_name
        }

        fn database_filename(&self) -> &str {
            &self.database_filename
        }

        fn max_retries(&self) -> u32 {
            self.max_retries
        }

        fn timeout_seconds(&self) -> u64 {
            self.timeout_seconds
        }

        fn retry_delay_ms(&self) -> u64 {
            self.retry_delay_ms
        }

        fn headers(&self) -> Vec<(String, String)> {
            self.headers.clone()
        }
    }

    fn sample_transactions() -> serde_json::Value {
        json!([
            {
                "transactionDate": "2024/03/15",
                "description": "Coffee Shop",
                "category": "Dining",
                "debit": 45.0,
                "credit": 0.0,
                "id": 1
            },
            {
                "transactionDate": "2024/03/16",
                "description": "Salary",
                "category": "Deposits",
                "debit": 0.0,
                "credit": 2500.0,
                "id": 2
            }
        ])
    }

    #[tokio::test]
    async fn test_extract_successful_api_response() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(sample_transactions());
        });

        let pipeline = TransactionPipeline::new(MockStorage::new(), MockConfig::new(server.url("/")));
        let records = pipeline.extract().await.unwrap();

        api_mock.assert();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].data.get("description").unwrap().as_str().unwrap(),
            "Coffee Shop"
        );
    }

    #[tokio::test]
    async fn test_extract_single_object_becomes_one_record() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({"id": 1, "category": "Dining"}));
        });

        let pipeline = TransactionPipeline::new(MockStorage::new(), MockConfig::new(server.url("/")));
        let records = pipeline.extract().await.unwrap();

        api_mock.assert();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_str("category"), Some("Dining"));
    }

    #[tokio::test]
    async fn test_extract_retries_then_fails() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(500);
        });

        let config = MockConfig::new(server.url("/")).with_max_retries(2);
        let pipeline = TransactionPipeline::new(MockStorage::new(), config);
        let error = pipeline.extract().await.unwrap_err();

        assert_eq!(api_mock.hits(), 2);
        assert!(matches!(error, EtlError::ProcessingError { .. }));
    }

    #[tokio::test]
    async fn test_extract_timeout_triggers_retry() {
        let server = MockServer::start();
        let slow_mock = server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(sample_transactions())
                .delay(std::time::Duration::from_millis(1500));
        });

        let config = MockConfig::new(server.url("/"))
            .with_max_retries(2)
            .with_timeout_seconds(1);
        let pipeline = TransactionPipeline::new(MockStorage::new(), config);
        let error = pipeline.extract().await.unwrap_err();

        assert_eq!(slow_mock.hits(), 2);
        assert!(matches!(error, EtlError::ApiError(_)));
    }

    #[tokio::test]
    async fn test_extract_sends_configured_headers() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/").header("x-api-key", "secret");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(sample_transactions());
        });

        let config = MockConfig::new(server.url("/")).with_header("x-api-key", "secret");
        let pipeline = TransactionPipeline::new(MockStorage::new(), config);
        let records = pipeline.extract().await.unwrap();

        api_mock.assert();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_transform_derives_features() {
        let records = parse_records(sample_transactions());
        let pipeline = TransactionPipeline::new(
            MockStorage::new(),
            MockConfig::new("http://test.invalid".to_string()),
        );

        let result = pipeline.transform(records).await.unwrap();

        assert!(!result.degraded);
        assert_eq!(result.records.len(), 2);
        let coffee = &result.records[0];
        assert_eq!(coffee.get_f64("net_transaction_amount"), Some(-45.0));
        assert_eq!(coffee.get_str("transaction_size"), Some("small"));
        assert_eq!(coffee.get_str("category_type"), Some("food_beverage"));
        assert!(result.columns.contains(&"data_quality_score".to_string()));
        // columns come out sorted
        let mut sorted = result.columns.clone();
        sorted.sort();
        assert_eq!(result.columns, sorted);
    }

    fn parse_records(data: serde_json::Value) -> Vec<Record> {
        TransactionPipeline::<MockStorage, MockConfig>::parse_response(data)
    }

    #[tokio::test]
    async fn test_transform_empty_input_degrades() {
        let pipeline = TransactionPipeline::new(
            MockStorage::new(),
            MockConfig::new("http://test.invalid".to_string()),
        );

        let result = pipeline.transform(Vec::new()).await.unwrap();
        assert!(result.degraded);
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn test_clean_only_skips_feature_derivation() {
        let pipeline = TransactionPipeline::new(
            MockStorage::new(),
            MockConfig::new("http://test.invalid".to_string()),
        )
        .clean_only(true);

        let result = pipeline
            .transform(parse_records(sample_transactions()))
            .await
            .unwrap();

        assert!(!result.degraded);
        let coffee = &result.records[0];
        assert_eq!(coffee.get_str("transaction_date"), Some("2024-03-15"));
        assert!(coffee.is_null("net_transaction_amount"));
        assert!(coffee.is_null("category_type"));
    }

    #[tokio::test]
    async fn test_load_writes_zip_database_and_dump() {
        let dir = tempdir().unwrap();
        let storage = MockStorage::new();
        let config = MockConfig::new("http://test.invalid".to_string())
            .with_output_path(dir.path().to_str().unwrap());
        let pipeline = TransactionPipeline::new(storage.clone(), config);

        let transform_result = pipeline
            .transform(parse_records(sample_transactions()))
            .await
            .unwrap();
        let output_path = pipeline.load(transform_result).await.unwrap();

        assert!(output_path.ends_with("processed_transactions.zip"));

        let zip_data = storage.get_file("processed_transactions.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["processed.csv", "processed.json", "metadata.json"]
        );

        assert!(dir.path().join("etl_results.sqlite").exists());

        let dump = storage.get_file("database_dump.sql").await.unwrap();
        let dump_text = String::from_utf8(dump).unwrap();
        assert!(dump_text.contains("CREATE TABLE"));
        assert!(dump_text.contains("INSERT INTO"));
    }
}
