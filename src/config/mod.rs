pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_url, Validate,
};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "txn-etl")]
#[command(about = "Batch ETL for bank transaction data")]
pub struct CliConfig {
    #[arg(long, default_value = "https://api.sampleapis.com/fakebank/accounts")]
    pub api_endpoint: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = "accounts")]
    pub table_name: String,

    #[arg(long, default_value = "etl_results.sqlite")]
    pub database_filename: String,

    #[arg(long, default_value = "3")]
    pub max_retries: u32,

    #[arg(long, default_value = "30", help = "Per-request timeout in seconds")]
    pub timeout_seconds: u64,

    #[arg(long, default_value = "500", help = "Delay between retries in milliseconds")]
    pub retry_delay_ms: u64,

    #[arg(long, default_value = "database_dump.sql")]
    pub dump_filename: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Enable system resource monitoring")]
    pub monitor: bool,

    #[arg(long, help = "Clean and deduplicate only, skip feature derivation")]
    pub clean_only: bool,

    #[arg(long, help = "Run analysis reports after loading")]
    pub reports: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
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

    fn dump_filename(&self) -> &str {
        &self.dump_filename
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> crate::utils::error::Result<()> {
        validate_url("api_endpoint", &self.api_endpoint)?;
        validate_path("output_path", &self.output_path)?;
        validate_non_empty_string("table_name", &self.table_name)?;
        validate_non_empty_string("database_filename", &self.database_filename)?;
        validate_non_empty_string("dump_filename", &self.dump_filename)?;
        validate_positive_number("max_retries", self.max_retries as usize, 1)?;
        validate_positive_number("timeout_seconds", self.timeout_seconds as usize, 1)?;
        Ok(())
    }
}
