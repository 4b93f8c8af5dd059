pub mod config;
pub mod core;
pub mod domain;
pub mod load;
pub mod transform;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::cli::LocalStorage;

pub use crate::core::{etl::EtlEngine, pipeline::TransactionPipeline};
pub use transform::{TransformOutcome, Transformer};
pub use utils::error::{EtlError, Result};
