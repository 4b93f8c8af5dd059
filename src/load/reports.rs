use crate::utils::error::Result;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// A canned analysis query run against the loaded database.
pub struct Report {
    pub name: &'static str,
    pub sql: String,
}

pub fn report_queries(table: &str) -> Vec<Report> {
    let quoted = format!("\"{}\"", table.replace('"', "\"\""));
    vec![
        Report {
            name: "transactions_per_category",
            sql: format!(
                "SELECT transaction_category, COUNT(*) AS txn_count \
                 FROM {quoted} GROUP BY transaction_category \
                 ORDER BY txn_count DESC"
            ),
        },
        Report {
            name: "net_amount_by_category",
            sql: format!(
                "SELECT transaction_category, \
                        ROUND(AVG(net_transaction_amount), 2) AS avg_net, \
                        ROUND(SUM(net_transaction_amount), 2) AS total_net \
                 FROM {quoted} GROUP BY transaction_category \
                 ORDER BY total_net"
            ),
        },
        Report {
            name: "anomalous_transactions",
            sql: format!(
                "SELECT * FROM {quoted} WHERE is_anomaly = 1 \
                 ORDER BY net_transaction_amount"
            ),
        },
    ]
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => b.iter().map(|byte| format!("{byte:02X}")).collect(),
    }
}

/// Run every report against the database and write each one as a CSV under
/// `<output_dir>/reports/`. Returns the written paths.
pub fn run_reports(db_path: &Path, table: &str, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let conn = Connection::open(db_path)?;
    let reports_dir = output_dir.join("reports");
    std::fs::create_dir_all(&reports_dir)?;

    let mut written = Vec::new();
    for report in report_queries(table) {
        let mut stmt = conn.prepare(&report.sql)?;
        let headers: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();

        let path = reports_dir.join(format!("{}.csv", report.name));
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(&headers)?;

        let mut row_count = 0usize;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let cells: Vec<String> = (0..headers.len())
                .map(|i| row.get_ref(i).map(render_value))
                .collect::<std::result::Result<_, _>>()?;
            writer.write_record(&cells)?;
            row_count += 1;
        }
        writer.flush()?;

        tracing::info!(
            "📊 Report '{}': {} rows -> {}",
            report.name,
            row_count,
            path.display()
        );
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Record, TransformResult};
    use crate::load::sqlite::save_to_database;
    use serde_json::json;
    use tempfile::tempdir;

    fn seeded_database(dir: &Path) -> PathBuf {
        let mut records = Vec::new();
        for (id, category, net, anomaly) in [
            ("t1", "Dining", -45.0, false),
            ("t2", "Dining", -20.0, false),
            ("t3", "Merchandise", -900.0, true),
        ] {
            let mut r = Record::new();
            r.insert("transaction_id", json!(id));
            r.insert("transaction_category", json!(category));
            r.insert("net_transaction_amount", json!(net));
            r.insert("is_anomaly", json!(anomaly));
            records.push(r);
        }

        let result = TransformResult {
            records,
            columns: vec![
                "is_anomaly".to_string(),
                "net_transaction_amount".to_string(),
                "transaction_category".to_string(),
                "transaction_id".to_string(),
            ],
            degraded: false,
        };

        let db_path = dir.join("report_test.sqlite");
        save_to_database(&db_path, "accounts", &result).unwrap();
        db_path
    }

    #[test]
    fn test_run_reports_writes_three_csvs() {
        let dir = tempdir().unwrap();
        let db_path = seeded_database(dir.path());

        let written = run_reports(&db_path, "accounts", dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        for path in &written {
            assert!(path.exists());
        }

        let per_category =
            std::fs::read_to_string(dir.path().join("reports/transactions_per_category.csv"))
                .unwrap();
        let mut lines = per_category.lines();
        assert_eq!(lines.next(), Some("transaction_category,txn_count"));
        assert_eq!(lines.next(), Some("Dining,2"));
        assert_eq!(lines.next(), Some("Merchandise,1"));

        let anomalies =
            std::fs::read_to_string(dir.path().join("reports/anomalous_transactions.csv"))
                .unwrap();
        assert_eq!(anomalies.lines().count(), 2); // header + one anomaly
        assert!(anomalies.contains("t3"));
    }
}
