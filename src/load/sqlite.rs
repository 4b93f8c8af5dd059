use crate::domain::model::{Record, TransformResult};
use crate::utils::error::Result;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite type affinity for a column, inferred from its non-null values:
/// all numbers -> REAL, all booleans -> INTEGER, anything else -> TEXT.
fn column_affinity(records: &[Record], column: &str) -> &'static str {
    let mut saw_value = false;
    let mut all_numbers = true;
    let mut all_bools = true;

    for record in records {
        match record.data.get(column) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(_)) => {
                saw_value = true;
                all_bools = false;
            }
            Some(Value::Bool(_)) => {
                saw_value = true;
                all_numbers = false;
            }
            Some(_) => {
                saw_value = true;
                all_numbers = false;
                all_bools = false;
            }
        }
    }

    if saw_value && all_numbers {
        "REAL"
    } else if saw_value && all_bools {
        "INTEGER"
    } else {
        "TEXT"
    }
}

fn to_sql_value(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Number(n)) => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        Some(Value::Bool(b)) => SqlValue::Integer(*b as i64),
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

/// Replace `table` in the database with the transformed records. The table is
/// dropped and recreated on every run so the schema always matches the batch.
pub fn save_to_database(db_path: &Path, table: &str, result: &TransformResult) -> Result<usize> {
    if result.columns.is_empty() {
        tracing::warn!("🔶 No columns to persist, skipping database write");
        return Ok(0);
    }

    let mut conn = Connection::open(db_path)?;
    let quoted = quote_identifier(table);

    let column_defs: Vec<String> = result
        .columns
        .iter()
        .map(|column| {
            format!(
                "{} {}",
                quote_identifier(column),
                column_affinity(&result.records, column)
            )
        })
        .collect();

    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {quoted}; CREATE TABLE {quoted} ({});",
        column_defs.join(", ")
    ))?;

    let placeholders = vec!["?"; result.columns.len()].join(", ");
    let insert_sql = format!("INSERT INTO {quoted} VALUES ({placeholders})");

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&insert_sql)?;
        for record in &result.records {
            let values: Vec<SqlValue> = result
                .columns
                .iter()
                .map(|column| to_sql_value(record.data.get(column)))
                .collect();
            stmt.execute(rusqlite::params_from_iter(values))?;
        }
    }
    tx.commit()?;

    tracing::info!(
        "💾 Saved {} records to table '{}' in {}",
        result.records.len(),
        table,
        db_path.display()
    );
    Ok(result.records.len())
}

fn sql_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => {
            let text = String::from_utf8_lossy(t);
            format!("'{}'", text.replace('\'', "''"))
        }
        ValueRef::Blob(b) => {
            let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
            format!("X'{hex}'")
        }
    }
}

/// Dump the whole database as executable SQL text: schema statements from
/// sqlite_master plus one INSERT per row, wrapped in a transaction.
pub fn dump_database(db_path: &Path) -> Result<String> {
    let conn = Connection::open(db_path)?;
    let mut dump = String::from("BEGIN TRANSACTION;\n");

    let mut schema_stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master \
         WHERE sql NOT NULL AND type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )?;
    let tables: Vec<(String, String)> = schema_stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<_, _>>()?;

    for (table, schema_sql) in &tables {
        dump.push_str(schema_sql);
        dump.push_str(";\n");

        let mut row_stmt = conn.prepare(&format!("SELECT * FROM {}", quote_identifier(table)))?;
        let column_count = row_stmt.column_count();
        let mut rows = row_stmt.query([])?;
        while let Some(row) = rows.next()? {
            let literals: Vec<String> = (0..column_count)
                .map(|i| row.get_ref(i).map(sql_literal))
                .collect::<std::result::Result<_, _>>()?;
            dump.push_str(&format!(
                "INSERT INTO {} VALUES ({});\n",
                quote_identifier(table),
                literals.join(", ")
            ));
        }
    }

    dump.push_str("COMMIT;\n");
    Ok(dump)
}

/// Rebuild a database from a SQL dump produced by `dump_database`.
pub fn restore_from_dump(db_path: &Path, dump_sql: &str) -> Result<()> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(dump_sql)?;
    tracing::info!("💾 Restored database at {}", db_path.display());
    Ok(())
}
