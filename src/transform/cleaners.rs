use crate::transform::dataset::Dataset;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Columns treated as calendar dates when present.
const DATE_COLUMNS: &[&str] = &["transaction_date", "created_date", "date", "updated_date"];

/// Columns treated as financial amounts when present.
const AMOUNT_COLUMNS: &[&str] = &["credit_amount", "debit_amount", "amount", "balance"];

static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[$,€£¥]").unwrap());
static NON_NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.\-]").unwrap());

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%d %b %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Best-effort parse of a scalar into a calendar date.
pub(crate) fn parse_date_value(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    None
}

/// Round to 2 decimal places for financial precision.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Normalize every date-like column to `YYYY-MM-DD` strings; values that do
/// not parse become null. Parse trouble is logged and never fatal.
pub fn clean_dates(dataset: &mut Dataset) {
    for column in DATE_COLUMNS {
        if !dataset.has_column(column) {
            continue;
        }

        let mut unparsable = 0usize;
        let values: Vec<Value> = dataset
            .records()
            .iter()
            .map(|record| {
                let value = record.data.get(*column).unwrap_or(&Value::Null);
                if value.is_null() {
                    return Value::Null;
                }
                match parse_date_value(value) {
                    Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
                    None => {
                        unparsable += 1;
                        Value::Null
                    }
                }
            })
            .collect();

        dataset.add_column(column, values);

        if unparsable > 0 {
            tracing::warn!(
                "🔶 Could not parse {} date value(s) in column '{}'; set to null",
                unparsable,
                column
            );
        } else {
            tracing::debug!("🔄 Date conversion completed for column: {}", column);
        }
    }
}

/// Coerce one raw value to a finite amount. Total: anything unparsable is 0.
fn clean_amount_value(value: &Value) -> f64 {
    let number = match value {
        Value::Null => 0.0,
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        other => {
            let text = match other {
                Value::String(s) => s.trim().to_string(),
                v => v.to_string(),
            };
            if text.is_empty() || text == "nan" || text == "NaN" || text == "None" {
                0.0
            } else {
                let stripped = CURRENCY_RE.replace_all(&text, "");
                let stripped = NON_NUMERIC_RE.replace_all(&stripped, "");
                stripped.parse::<f64>().unwrap_or(0.0)
            }
        }
    };

    if number.is_finite() {
        round2(number)
    } else {
        0.0
    }
}

/// Strip currency symbols and coerce every amount-like column to numbers
/// rounded to 2 decimals. Never fails and never leaves a non-numeric value
/// behind.
pub fn clean_amounts(dataset: &mut Dataset) {
    for column in AMOUNT_COLUMNS {
        if !dataset.has_column(column) {
            continue;
        }

        let values: Vec<Value> = dataset
            .records()
            .iter()
            .map(|record| {
                let raw = record.data.get(*column).unwrap_or(&Value::Null);
                let amount = clean_amount_value(raw);
                // clean_amount_value only returns finite values
                serde_json::Number::from_f64(amount)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            })
            .collect();

        dataset.add_column(column, values);
        tracing::debug!("🔄 Amount cleaning completed for column: {}", column);
    }
}
