use crate::transform::dataset::Dataset;
use crate::transform::TransformError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static UPPERCASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z])").unwrap());
static LEADING_UNDERSCORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^_").unwrap());
static REPEATED_UNDERSCORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// Source-specific names folded onto the canonical transaction schema after
/// snake_case conversion.
const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("category", "transaction_category"),
    ("credit", "credit_amount"),
    ("debit", "debit_amount"),
    ("description", "transaction_description"),
    ("id", "transaction_id"),
    ("transactiondate", "transaction_date"),
];

/// Snake_case a raw column name, then apply the alias table.
///
/// Conversion inserts an underscore before every uppercase letter, lowercases
/// the result, strips one leading underscore and collapses runs of
/// underscores, so `transactionDate` becomes `transaction_date` and an
/// already-canonical name maps to itself.
pub fn canonical_name(raw: &str) -> String {
    let snaked = UPPERCASE_RE.replace_all(raw, "_$1").to_lowercase();
    let snaked = LEADING_UNDERSCORE_RE.replace(&snaked, "");
    let snaked = REPEATED_UNDERSCORE_RE.replace_all(&snaked, "_");

    for (alias, canonical) in COLUMN_ALIASES {
        if snaked == *alias {
            return canonical.to_string();
        }
    }
    snaked.into_owned()
}

/// Rename every column to its canonical form. Renaming is total: columns
/// without an alias keep their normalized name.
///
/// Fails only when two distinct source columns collapse onto the same
/// canonical name, since picking a winner would silently drop data.
pub fn normalize_columns(mut dataset: Dataset) -> Result<Dataset, TransformError> {
    let mut mapping = Vec::new();
    let mut seen: HashMap<String, String> = HashMap::new();

    for column in dataset.columns() {
        let canonical = canonical_name(&column);
        if let Some(previous) = seen.get(&canonical) {
            return Err(TransformError::ColumnCollision {
                left: previous.clone(),
                right: column.clone(),
                canonical,
            });
        }
        seen.insert(canonical.clone(), column.clone());
        mapping.push((column, canonical));
    }

    let renamed: Vec<&(String, String)> = mapping.iter().filter(|(old, new)| old != new).collect();
    if !renamed.is_empty() {
        tracing::debug!(
            "🔄 Column normalization renamed {} of {} columns",
            renamed.len(),
            mapping.len()
        );
    }

    dataset.rename_columns(&mapping);
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Record;
    use serde_json::json;

    #[test]
    fn test_canonical_name_snake_case() {
        assert_eq!(canonical_name("transactionDate"), "transaction_date");
        assert_eq!(canonical_name("CreatedDate"), "created_date");
        assert_eq!(canonical_name("some__Weird_Name"), "some_weird_name");
    }

    #[test]
    fn test_canonical_name_aliases() {
        assert_eq!(canonical_name("category"), "transaction_category");
        assert_eq!(canonical_name("Credit"), "credit_amount");
        assert_eq!(canonical_name("debit"), "debit_amount");
        assert_eq!(canonical_name("Description"), "transaction_description");
        assert_eq!(canonical_name("id"), "transaction_id");
    }

    #[test]
    fn test_canonical_name_pass_through() {
        assert_eq!(canonical_name("balance"), "balance");
        assert_eq!(canonical_name("transaction_date"), "transaction_date");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let mut record = Record::new();
        record.insert("transactionDate", json!("2024-01-01"));
        record.insert("Category", json!("Dining"));

        let once = normalize_columns(Dataset::from_records(vec![record])).unwrap();
        let first_pass = once.columns();
        let twice = normalize_columns(once).unwrap();

        assert_eq!(first_pass, twice.columns());
        assert!(twice.has_column("transaction_date"));
        assert!(twice.has_column("transaction_category"));
    }

    #[test]
    fn test_collision_is_an_error() {
        let mut record = Record::new();
        record.insert("Category", json!("a"));
        record.insert("category", json!("b"));

        let err = normalize_columns(Dataset::from_records(vec![record])).unwrap_err();
        assert!(matches!(err, TransformError::ColumnCollision { .. }));
    }
}
