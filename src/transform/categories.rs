use crate::transform::dataset::Dataset;
use crate::transform::TransformError;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Numeric level used by the feature engine: low=1, medium=2, high=3.
    pub fn level(self) -> i64 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CategoryInfo {
    pub category_type: &'static str,
    pub tax_deductible: bool,
    pub priority: Priority,
}

/// Immutable lookup from transaction category label to business attributes.
///
/// Built once and injected into the transformer; matching is exact string
/// equality, no normalization of the label.
#[derive(Debug, Clone)]
pub struct CategoryLookup {
    entries: HashMap<&'static str, CategoryInfo>,
}

const UNMAPPED: CategoryInfo = CategoryInfo {
    category_type: "unknown",
    tax_deductible: false,
    priority: Priority::Low,
};

impl CategoryLookup {
    /// The builtin table covering the category labels observed in the
    /// fakebank dataset.
    pub fn builtin() -> Self {
        use Priority::{High, Low, Medium};

        let table: &[(&str, &str, bool, Priority)] = &[
            ("Other Services", "service", false, Medium),
            ("Health Care", "healthcare", true, High),
            ("Payment/Credit", "payment", false, High),
            ("Merchandise", "retail", false, Low),
            ("Phone/Cable", "utilities", false, Medium),
            ("Fee/Interest Charge", "fee", false, High),
            ("Other", "miscellaneous", false, Low),
            ("Dining", "food_beverage", false, Low),
            ("Gas/Automotive", "transportation", true, Medium),
            ("Other Travel", "travel", true, Medium),
            ("restaurants", "food_beverage", false, Low),
            ("beauty", "personal_care", false, Low),
            ("fuel", "transportation", true, Medium),
            ("air", "transportation", true, Medium),
            ("gaz", "transportation", true, Medium),
            ("food", "food_beverage", false, Low),
            ("taxi", "transportation", true, Medium),
        ];

        let entries = table
            .iter()
            .map(|(label, category_type, tax_deductible, priority)| {
                (
                    *label,
                    CategoryInfo {
                        category_type,
                        tax_deductible: *tax_deductible,
                        priority: *priority,
                    },
                )
            })
            .collect();

        Self { entries }
    }

    /// Exact-match lookup; unmapped labels resolve to
    /// `{unknown, false, low}`.
    pub fn resolve(&self, label: Option<&str>) -> &CategoryInfo {
        label
            .and_then(|l| self.entries.get(l))
            .unwrap_or(&UNMAPPED)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CategoryLookup {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Attach `category_type`, `category_tax_deductible` and `category_priority`
/// to every record from the lookup.
pub fn enrich(dataset: &mut Dataset, lookup: &CategoryLookup) -> Result<(), TransformError> {
    if !dataset.has_column("transaction_category") {
        return Err(TransformError::MissingColumn(
            "transaction_category".to_string(),
        ));
    }

    let mut types = Vec::with_capacity(dataset.len());
    let mut deductible = Vec::with_capacity(dataset.len());
    let mut priorities = Vec::with_capacity(dataset.len());

    for record in dataset.records() {
        let info = lookup.resolve(record.get_str("transaction_category"));
        types.push(Value::String(info.category_type.to_string()));
        deductible.push(Value::Bool(info.tax_deductible));
        priorities.push(Value::String(info.priority.as_str().to_string()));
    }

    dataset.add_column("category_type", types);
    dataset.add_column("category_tax_deductible", deductible);
    dataset.add_column("category_priority", priorities);

    tracing::debug!("🔄 Category enrichment completed for {} records", dataset.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Record;
    use serde_json::json;

    fn dataset_with_categories(labels: &[Value]) -> Dataset {
        let records = labels
            .iter()
            .map(|label| {
                let mut r = Record::new();
                r.insert("transaction_category", label.clone());
                r
            })
            .collect();
        Dataset::from_records(records)
    }

    #[test]
    fn test_known_category_attributes() {
        let mut ds = dataset_with_categories(&[json!("Dining"), json!("Health Care")]);
        enrich(&mut ds, &CategoryLookup::builtin()).unwrap();

        let dining = &ds.records()[0];
        assert_eq!(dining.get_str("category_type"), Some("food_beverage"));
        assert_eq!(dining.get_bool("category_tax_deductible"), Some(false));
        assert_eq!(dining.get_str("category_priority"), Some("low"));

        let health = &ds.records()[1];
        assert_eq!(health.get_str("category_type"), Some("healthcare"));
        assert_eq!(health.get_bool("category_tax_deductible"), Some(true));
        assert_eq!(health.get_str("category_priority"), Some("high"));
    }

    #[test]
    fn test_unmapped_category_fallback() {
        let mut ds = dataset_with_categories(&[json!("Nonexistent"), Value::Null]);
        enrich(&mut ds, &CategoryLookup::builtin()).unwrap();

        for record in ds.records() {
            assert_eq!(record.get_str("category_type"), Some("unknown"));
            assert_eq!(record.get_bool("category_tax_deductible"), Some(false));
            assert_eq!(record.get_str("category_priority"), Some("low"));
        }
    }

    #[test]
    fn test_matching_is_exact_not_fuzzy() {
        let mut ds = dataset_with_categories(&[json!("dining")]);
        enrich(&mut ds, &CategoryLookup::builtin()).unwrap();
        assert_eq!(ds.records()[0].get_str("category_type"), Some("unknown"));
    }

    #[test]
    fn test_missing_category_column_is_an_error() {
        let mut r = Record::new();
        r.insert("transaction_id", json!(1));
        let mut ds = Dataset::from_records(vec![r]);

        let err = enrich(&mut ds, &CategoryLookup::builtin()).unwrap_err();
        assert!(matches!(err, TransformError::MissingColumn(_)));
    }

    #[test]
    fn test_builtin_table_size() {
        assert_eq!(CategoryLookup::builtin().len(), 17);
    }
}
