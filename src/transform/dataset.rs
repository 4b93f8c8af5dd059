use crate::domain::model::Record;
use std::collections::BTreeSet;

/// An ordered batch of records sharing one schema.
///
/// The schema is the column union across all records; rows missing a column
/// carry an explicit null. Stages check `has_column` before touching a
/// column instead of probing individual rows, and add derived columns with
/// `add_column`, which keeps the union invariant intact.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Record>,
    columns: BTreeSet<String>,
}

impl Dataset {
    pub fn from_records(mut records: Vec<Record>) -> Self {
        let mut columns = BTreeSet::new();
        for record in &records {
            for key in record.data.keys() {
                columns.insert(key.clone());
            }
        }

        for record in &mut records {
            for column in &columns {
                record
                    .data
                    .entry(column.clone())
                    .or_insert(serde_json::Value::Null);
            }
        }

        Self { records, columns }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Column names in sorted order; the stable output schema.
    pub fn columns(&self) -> Vec<String> {
        self.columns.iter().cloned().collect()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Assign a full column of values, one per row.
    pub fn add_column(&mut self, name: &str, values: Vec<serde_json::Value>) {
        debug_assert_eq!(values.len(), self.records.len());
        self.columns.insert(name.to_string());
        for (record, value) in self.records.iter_mut().zip(values) {
            record.data.insert(name.to_string(), value);
        }
    }

    /// Replace every record's key set according to `old -> new` pairs.
    /// Used by the column normalizer after it has built a collision-free map.
    pub fn rename_columns(&mut self, mapping: &[(String, String)]) {
        for record in &mut self.records {
            for (old, new) in mapping {
                if old == new {
                    continue;
                }
                if let Some(value) = record.data.remove(old) {
                    record.data.insert(new.clone(), value);
                }
            }
        }
        for (old, new) in mapping {
            if old != new {
                self.columns.remove(old);
                self.columns.insert(new.clone());
            }
        }
    }

    /// Numeric view of a column; null and non-numeric values come back None.
    pub fn column_f64(&self, name: &str) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.get_f64(name)).collect()
    }

    /// Keep only rows where `keep` returned true, preserving order.
    pub fn retain<F: FnMut(&Record) -> bool>(&mut self, mut keep: F) {
        self.records.retain(|r| keep(r));
    }
}
