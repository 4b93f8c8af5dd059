pub mod categories;
pub mod cleaners;
pub mod columns;
pub mod dataset;
pub mod features;

use crate::domain::model::Record;
use self::categories::CategoryLookup;
use self::dataset::Dataset;
use std::collections::HashSet;

/// Failures inside the transformation core. These never abort a run: the
/// caller receives the untouched input alongside the error instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("no records to transform")]
    EmptyInput,

    #[error("columns '{left}' and '{right}' both normalize to '{canonical}'")]
    ColumnCollision {
        left: String,
        right: String,
        canonical: String,
    },

    #[error("required column '{0}' is missing")]
    MissingColumn(String),
}

/// Result of a transformation pass. On failure `records` holds the original
/// input unchanged and `error` says why the pipeline degraded.
#[derive(Debug)]
pub struct TransformOutcome {
    pub records: Vec<Record>,
    pub error: Option<TransformError>,
}

impl TransformOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// The transformation core: column normalization, date and amount cleaning,
/// category enrichment, and feature derivation.
pub struct Transformer {
    categories: CategoryLookup,
}

impl Transformer {
    pub fn new() -> Self {
        Self {
            categories: CategoryLookup::builtin(),
        }
    }

    pub fn with_lookup(categories: CategoryLookup) -> Self {
        Self { categories }
    }

    /// Full transformation pass. Never fails outright: any error degrades to
    /// returning the input records untouched, so downstream loading always
    /// has something to write.
    pub fn transform_records(&self, records: Vec<Record>) -> TransformOutcome {
        let input_count = records.len();
        match self.try_transform(records.clone()) {
            Ok(transformed) => {
                tracing::info!(
                    "✅ Transformation completed: {} -> {} records",
                    input_count,
                    transformed.len()
                );
                TransformOutcome {
                    records: transformed,
                    error: None,
                }
            }
            Err(error) => {
                tracing::error!("❌ Transformation failed, passing input through: {error}");
                TransformOutcome {
                    records,
                    error: Some(error),
                }
            }
        }
    }

    fn try_transform(&self, records: Vec<Record>) -> Result<Vec<Record>, TransformError> {
        if records.is_empty() {
            return Err(TransformError::EmptyInput);
        }

        let dataset = Dataset::from_records(records);
        let mut dataset = columns::normalize_columns(dataset)?;
        cleaners::clean_dates(&mut dataset);
        cleaners::clean_amounts(&mut dataset);
        categories::enrich(&mut dataset, &self.categories)?;
        features::add_features(&mut dataset);

        Ok(dataset.into_records())
    }

    /// Cleaning-only pass: normalize columns, clean dates and amounts, and
    /// drop duplicate transaction ids (first occurrence wins). Skips category
    /// enrichment and feature derivation. Degrades like `transform_records`.
    pub fn clean_records(&self, records: Vec<Record>) -> TransformOutcome {
        match self.try_clean(records.clone()) {
            Ok(cleaned) => TransformOutcome {
                records: cleaned,
                error: None,
            },
            Err(error) => {
                tracing::error!("❌ Cleaning failed, passing input through: {error}");
                TransformOutcome {
                    records,
                    error: Some(error),
                }
            }
        }
    }

    fn try_clean(&self, records: Vec<Record>) -> Result<Vec<Record>, TransformError> {
        if records.is_empty() {
            return Err(TransformError::EmptyInput);
        }

        let dataset = Dataset::from_records(records);
        let mut dataset = columns::normalize_columns(dataset)?;
        cleaners::clean_dates(&mut dataset);
        cleaners::clean_amounts(&mut dataset);

        if !dataset.has_column("transaction_id") {
            return Err(TransformError::MissingColumn("transaction_id".to_string()));
        }

        let before = dataset.len();
        let mut seen = HashSet::new();
        dataset.retain(|record| {
            // null ids all collide on the same key
            let key = record
                .get_str("transaction_id")
                .map(|s| s.to_string())
                .or_else(|| record.get_f64("transaction_id").map(|n| n.to_string()));
            seen.insert(key)
        });
        let dropped = before - dataset.len();
        if dropped > 0 {
            tracing::warn!("🔶 Dropped {dropped} duplicate transaction ids");
        }

        Ok(dataset.into_records())
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}
