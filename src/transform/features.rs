use crate::transform::cleaners::{parse_date_value, round2};
use crate::transform::dataset::Dataset;
use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

// Keyword sets are matched against the lowercased description.
static SUBSCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"subscription|suscrip|netflix|spotify|itunes|prime|membership").unwrap()
});
static ATM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\batm\b").unwrap());
static TRANSFER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"transfer|transf|zelle|wire|sepa").unwrap());
static REFUND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"refund|reversal|chargeback|reembolso").unwrap());

const DISCRETIONARY_TYPES: &[&str] = &["food_beverage", "personal_care", "retail", "miscellaneous"];

fn num_i(value: i64) -> Value {
    Value::Number(value.into())
}

/// Derived numerics are finite or null, never NaN/Inf.
fn num_f(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Derive all analytic features over a normalized, cleaned, category-enriched
/// dataset. Every block checks the columns it needs and silently skips when
/// they are absent.
pub fn add_features(dataset: &mut Dataset) {
    add_net_amount(dataset);
    add_amount_flags(dataset);
    add_size_buckets(dataset);
    add_anomaly_flags(dataset);
    add_temporal_features(dataset);
    add_quality_scores(dataset);
    add_business_flags(dataset);
    add_category_features(dataset);
    add_text_features(dataset);
    add_category_statistics(dataset);
    add_days_since_prev_same_desc(dataset);
    add_refund_flags(dataset);
    stamp_processed_at(dataset);

    tracing::debug!(
        "🔄 Feature derivation completed: {} records, {} columns",
        dataset.len(),
        dataset.columns().len()
    );
}

/// `net = credit - |debit|`, plus the credit/debit/neutral direction.
fn add_net_amount(dataset: &mut Dataset) {
    if !dataset.has_column("credit_amount") || !dataset.has_column("debit_amount") {
        return;
    }

    let mut nets = Vec::with_capacity(dataset.len());
    let mut directions = Vec::with_capacity(dataset.len());

    for record in dataset.records() {
        let credit = record.get_f64("credit_amount").unwrap_or(0.0);
        let debit = record.get_f64("debit_amount").unwrap_or(0.0);
        nets.push(num_f(credit - debit.abs()));

        let direction = if credit > 0.0 {
            "credit"
        } else if debit > 0.0 {
            "debit"
        } else {
            "neutral"
        };
        directions.push(Value::String(direction.to_string()));
    }

    dataset.add_column("net_transaction_amount", nets);
    dataset.add_column("transaction_direction", directions);
}

fn add_amount_flags(dataset: &mut Dataset) {
    if !dataset.has_column("net_transaction_amount") {
        return;
    }

    let nets = dataset.column_f64("net_transaction_amount");
    let abs: Vec<Value> = nets
        .iter()
        .map(|n| n.map(|v| num_f(v.abs())).unwrap_or(Value::Null))
        .collect();
    let income: Vec<Value> = nets
        .iter()
        .map(|n| Value::Bool(n.map(|v| v > 0.0).unwrap_or(false)))
        .collect();
    let expense: Vec<Value> = nets
        .iter()
        .map(|n| Value::Bool(n.map(|v| v < 0.0).unwrap_or(false)))
        .collect();

    dataset.add_column("amount_abs", abs);
    dataset.add_column("is_income", income);
    dataset.add_column("is_expense", expense);
}

/// Left-inclusive buckets over `|net|`.
fn size_bucket(abs_net: f64) -> &'static str {
    if abs_net < 10.0 {
        "micro"
    } else if abs_net < 50.0 {
        "small"
    } else if abs_net < 200.0 {
        "medium"
    } else if abs_net < 1000.0 {
        "large"
    } else {
        "very_large"
    }
}

fn add_size_buckets(dataset: &mut Dataset) {
    if !dataset.has_column("net_transaction_amount") {
        return;
    }

    let sizes: Vec<Value> = dataset
        .column_f64("net_transaction_amount")
        .into_iter()
        .map(|n| match n {
            Some(v) => Value::String(size_bucket(v.abs()).to_string()),
            None => Value::Null,
        })
        .collect();

    dataset.add_column("transaction_size", sizes);
}

/// Linear-interpolated percentile of a sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Tukey IQR outlier rule over the whole batch's net amount distribution.
/// Bounds are batch-relative: recomputed per run, so the flag marks
/// outliers within this extraction, not against any absolute threshold.
fn add_anomaly_flags(dataset: &mut Dataset) {
    if !dataset.has_column("net_transaction_amount") {
        return;
    }

    let mut values: Vec<f64> = dataset
        .column_f64("net_transaction_amount")
        .into_iter()
        .flatten()
        .collect();
    if values.is_empty() {
        return;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let q1 = percentile(&values, 0.25);
    let q3 = percentile(&values, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - 1.5 * iqr;
    let upper = q3 + 1.5 * iqr;

    let flags: Vec<Value> = dataset
        .column_f64("net_transaction_amount")
        .into_iter()
        .map(|n| Value::Bool(n.map(|v| v < lower || v > upper).unwrap_or(false)))
        .collect();

    dataset.add_column("is_anomaly", flags);
}

fn add_temporal_features(dataset: &mut Dataset) {
    if !dataset.has_column("transaction_date") {
        return;
    }

    let dates: Vec<Option<NaiveDate>> = dataset
        .records()
        .iter()
        .map(|record| {
            record
                .data
                .get("transaction_date")
                .and_then(parse_date_value)
        })
        .collect();

    let mut years = Vec::with_capacity(dates.len());
    let mut months = Vec::with_capacity(dates.len());
    let mut day_names = Vec::with_capacity(dates.len());
    let mut quarters = Vec::with_capacity(dates.len());
    let mut weekends = Vec::with_capacity(dates.len());
    let mut month_ends = Vec::with_capacity(dates.len());
    let mut month_starts = Vec::with_capacity(dates.len());
    let mut weeks = Vec::with_capacity(dates.len());
    let mut year_months = Vec::with_capacity(dates.len());

    for date in &dates {
        match date {
            Some(d) => {
                years.push(num_i(d.year() as i64));
                months.push(num_i(d.month() as i64));
                day_names.push(Value::String(d.format("%A").to_string()));
                quarters.push(num_i(((d.month() - 1) / 3 + 1) as i64));
                weekends.push(Value::Bool(matches!(
                    d.weekday(),
                    chrono::Weekday::Sat | chrono::Weekday::Sun
                )));
                let next_day = *d + chrono::Duration::days(1);
                month_ends.push(Value::Bool(next_day.month() != d.month()));
                month_starts.push(Value::Bool(d.day() == 1));
                weeks.push(num_i(d.iso_week().week() as i64));
                year_months.push(Value::String(d.format("%Y-%m").to_string()));
            }
            None => {
                years.push(Value::Null);
                months.push(Value::Null);
                day_names.push(Value::Null);
                quarters.push(Value::Null);
                weekends.push(Value::Bool(false));
                month_ends.push(Value::Bool(false));
                month_starts.push(Value::Bool(false));
                weeks.push(Value::Null);
                year_months.push(Value::Null);
            }
        }
    }

    dataset.add_column("transaction_year", years);
    dataset.add_column("transaction_month", months);
    dataset.add_column("transaction_day_of_week", day_names);
    dataset.add_column("transaction_quarter", quarters);
    dataset.add_column("is_weekend", weekends);
    dataset.add_column("is_month_end", month_ends);
    dataset.add_column("is_month_start", month_starts);
    dataset.add_column("week_of_year", weeks);
    dataset.add_column("year_month", year_months);
}

/// Per-record completeness score, clamped to [0, 100]:
/// -20 per missing critical field, -15 when both amounts are zero,
/// -5 for a missing description, -10 for an anomalous amount.
fn add_quality_scores(dataset: &mut Dataset) {
    const CRITICAL_FIELDS: &[&str] = &[
        "transaction_id",
        "transaction_category",
        "transaction_date",
    ];

    let has_amounts = dataset.has_column("credit_amount") && dataset.has_column("debit_amount");
    let has_description = dataset.has_column("transaction_description");
    let has_anomaly = dataset.has_column("is_anomaly");
    let critical: Vec<&str> = CRITICAL_FIELDS
        .iter()
        .copied()
        .filter(|f| dataset.has_column(f))
        .collect();

    let scores: Vec<Value> = dataset
        .records()
        .iter()
        .map(|record| {
            let mut score: f64 = 100.0;

            for field in &critical {
                if record.is_null(field) {
                    score -= 20.0;
                }
            }

            if has_amounts
                && record.get_f64("credit_amount") == Some(0.0)
                && record.get_f64("debit_amount") == Some(0.0)
            {
                score -= 15.0;
            }

            if has_description && record.is_null("transaction_description") {
                score -= 5.0;
            }

            if has_anomaly && record.get_bool("is_anomaly") == Some(true) {
                score -= 10.0;
            }

            num_f(score.clamp(0.0, 100.0))
        })
        .collect();

    dataset.add_column("data_quality_score", scores);
}

fn add_business_flags(dataset: &mut Dataset) {
    if dataset.has_column("transaction_category") {
        let mut fees = Vec::with_capacity(dataset.len());
        let mut payments = Vec::with_capacity(dataset.len());

        for record in dataset.records() {
            let category = record
                .get_str("transaction_category")
                .map(|c| c.to_lowercase())
                .unwrap_or_default();
            fees.push(Value::Bool(category.contains("fee")));
            payments.push(Value::Bool(category.contains("payment")));
        }

        dataset.add_column("is_fee_transaction", fees);
        dataset.add_column("is_payment_transaction", payments);
    }

    if dataset.has_column("net_transaction_amount") {
        let large: Vec<Value> = dataset
            .column_f64("net_transaction_amount")
            .into_iter()
            .map(|n| Value::Bool(n.map(|v| v.abs() > 500.0).unwrap_or(false)))
            .collect();
        dataset.add_column("is_large_transaction", large);
    }
}

fn add_category_features(dataset: &mut Dataset) {
    if dataset.has_column("category_priority") {
        let levels: Vec<Value> = dataset
            .records()
            .iter()
            .map(|record| {
                let level = match record.get_str("category_priority") {
                    Some("low") => 1,
                    Some("medium") => 2,
                    Some("high") => 3,
                    _ => 0,
                };
                num_i(level)
            })
            .collect();
        dataset.add_column("category_priority_level", levels);
    }

    if dataset.has_column("category_tax_deductible") {
        let flags: Vec<Value> = dataset
            .records()
            .iter()
            .map(|r| Value::Bool(r.get_bool("category_tax_deductible").unwrap_or(false)))
            .collect();
        dataset.add_column("is_tax_deductible", flags);
    }

    if dataset.has_column("category_type") {
        let flags: Vec<Value> = dataset
            .records()
            .iter()
            .map(|record| {
                let discretionary = record
                    .get_str("category_type")
                    .map(|t| DISCRETIONARY_TYPES.contains(&t))
                    .unwrap_or(false);
                Value::Bool(discretionary)
            })
            .collect();
        dataset.add_column("is_discretionary", flags);
    }

    if dataset.has_column("category_tax_deductible")
        && dataset.has_column("net_transaction_amount")
    {
        let amounts: Vec<Value> = dataset
            .records()
            .iter()
            .map(|record| {
                if record.get_bool("category_tax_deductible").unwrap_or(false) {
                    num_f(record.get_f64("net_transaction_amount").unwrap_or(0.0).abs())
                } else {
                    num_f(0.0)
                }
            })
            .collect();
        dataset.add_column("tax_deductible_amount", amounts);
    }
}

/// Lowercased description; a missing description reads as empty.
fn description_lower(record: &crate::domain::model::Record) -> String {
    record
        .get_str("transaction_description")
        .map(|d| d.to_lowercase())
        .unwrap_or_default()
}

fn add_text_features(dataset: &mut Dataset) {
    if !dataset.has_column("transaction_description") {
        return;
    }

    let descriptions: Vec<String> = dataset.records().iter().map(description_lower).collect();

    let lengths: Vec<Value> = descriptions
        .iter()
        .map(|d| num_i(d.chars().count() as i64))
        .collect();
    let subscriptions: Vec<Value> = descriptions
        .iter()
        .map(|d| Value::Bool(SUBSCRIPTION_RE.is_match(d)))
        .collect();
    let atms: Vec<Value> = descriptions
        .iter()
        .map(|d| Value::Bool(ATM_RE.is_match(d)))
        .collect();
    let transfers: Vec<Value> = descriptions
        .iter()
        .map(|d| Value::Bool(TRANSFER_RE.is_match(d)))
        .collect();
    let refunds: Vec<Value> = descriptions
        .iter()
        .map(|d| Value::Bool(REFUND_RE.is_match(d)))
        .collect();

    dataset.add_column("description_length", lengths);
    dataset.add_column("has_keyword_subscription", subscriptions);
    dataset.add_column("has_atm", atms);
    dataset.add_column("has_transfer", transfers);
    dataset.add_column("has_refund_keyword", refunds);

    // Recurrence: how often this exact description appears in the batch.
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for description in &descriptions {
        *counts.entry(description.as_str()).or_insert(0) += 1;
    }

    let txn_counts: Vec<Value> = descriptions
        .iter()
        .map(|d| num_i(counts[d.as_str()]))
        .collect();
    let recurring: Vec<Value> = descriptions
        .iter()
        .map(|d| Value::Bool(counts[d.as_str()] >= 3))
        .collect();

    dataset.add_column("description_txn_count", txn_counts);
    dataset.add_column("is_recurring_description", recurring);

    // Duplicate candidates: same date, same description, same rounded amount.
    // Every member of a colliding group is flagged, not just the later ones.
    if dataset.has_column("net_transaction_amount") && dataset.has_column("transaction_date") {
        let keys: Vec<String> = dataset
            .records()
            .iter()
            .zip(&descriptions)
            .map(|(record, description)| {
                let date = record.get_str("transaction_date").unwrap_or("");
                let net = record.get_f64("net_transaction_amount").unwrap_or(0.0);
                format!("{}|{}|{:.2}", date, description, round2(net))
            })
            .collect();

        let mut key_counts: HashMap<&str, usize> = HashMap::new();
        for key in &keys {
            *key_counts.entry(key.as_str()).or_insert(0) += 1;
        }

        let duplicates: Vec<Value> = keys
            .iter()
            .map(|k| Value::Bool(key_counts[k.as_str()] >= 2))
            .collect();
        dataset.add_column("is_duplicate_candidate", duplicates);
    }
}

/// Per-category mean/std of the net amount, the per-record z-score within its
/// category, and the spend ratio against the category mean. Degenerate groups
/// (single member, zero or null std, zero mean) yield 0 instead of NaN/Inf.
fn add_category_statistics(dataset: &mut Dataset) {
    if !dataset.has_column("transaction_category")
        || !dataset.has_column("net_transaction_amount")
    {
        return;
    }

    let mut groups: HashMap<String, Vec<f64>> = HashMap::new();
    for record in dataset.records() {
        if let (Some(category), Some(net)) = (
            record.get_str("transaction_category"),
            record.get_f64("net_transaction_amount"),
        ) {
            groups.entry(category.to_string()).or_default().push(net);
        }
    }

    struct GroupStats {
        mean: f64,
        std: Option<f64>,
    }

    let stats: HashMap<String, GroupStats> = groups
        .into_iter()
        .map(|(category, values)| {
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            // Sample standard deviation; undefined for single-member groups.
            let std = if values.len() >= 2 {
                let variance =
                    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                Some(variance.sqrt())
            } else {
                None
            };
            (category, GroupStats { mean, std })
        })
        .collect();

    let mut means = Vec::with_capacity(dataset.len());
    let mut stds = Vec::with_capacity(dataset.len());
    let mut zscores = Vec::with_capacity(dataset.len());
    let mut spend_ratios = Vec::with_capacity(dataset.len());

    for record in dataset.records() {
        let group = record
            .get_str("transaction_category")
            .and_then(|c| stats.get(c));
        let net = record.get_f64("net_transaction_amount");

        match (group, net) {
            (Some(g), Some(net)) => {
                means.push(num_f(g.mean));
                stds.push(g.std.map(num_f).unwrap_or(Value::Null));

                let zscore = match g.std {
                    Some(std) if std > 0.0 => (net - g.mean) / std,
                    _ => 0.0,
                };
                zscores.push(num_f(zscore));

                let ratio = net.abs() / g.mean.abs();
                spend_ratios.push(num_f(if ratio.is_finite() { ratio } else { 0.0 }));
            }
            _ => {
                means.push(Value::Null);
                stds.push(Value::Null);
                zscores.push(num_f(0.0));
                spend_ratios.push(num_f(0.0));
            }
        }
    }

    dataset.add_column("cat_net_mean", means);
    dataset.add_column("cat_net_std", stds);
    dataset.add_column("cat_net_zscore", zscores);
    dataset.add_column("spend_vs_category_mean", spend_ratios);
}

/// Day gap to the previous same-description transaction within this batch.
/// Rows are ordered by (description, date, original position) for the diff,
/// then the original row order is restored. Defined only when both the row
/// and its predecessor have parsable dates.
fn add_days_since_prev_same_desc(dataset: &mut Dataset) {
    if !dataset.has_column("transaction_description") || !dataset.has_column("transaction_date") {
        return;
    }

    let mut rows: Vec<(String, Option<NaiveDate>, usize)> = dataset
        .records()
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let description = description_lower(record);
            let date = record
                .data
                .get("transaction_date")
                .and_then(parse_date_value);
            (description, date, index)
        })
        .collect();

    // Stable sort; rows without a date go last within their description group.
    rows.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.is_none().cmp(&b.1.is_none()))
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    });

    let mut gaps: Vec<Value> = vec![Value::Null; dataset.len()];
    let mut current_description: Option<&str> = None;
    let mut previous_date: Option<NaiveDate> = None;

    for (description, date, index) in &rows {
        if current_description != Some(description.as_str()) {
            current_description = Some(description.as_str());
            previous_date = None;
        }

        if let (Some(current), Some(previous)) = (date, previous_date) {
            gaps[*index] = num_i((*current - previous).num_days());
        }
        previous_date = *date;
    }

    dataset.add_column("days_since_prev_same_desc", gaps);
}

/// Refund = refund-like keyword, or a positive net amount on a
/// Payment/Credit category.
fn add_refund_flags(dataset: &mut Dataset) {
    if !dataset.has_column("net_transaction_amount") {
        return;
    }

    let flags: Vec<Value> = dataset
        .records()
        .iter()
        .map(|record| {
            let keyword = record.get_bool("has_refund_keyword").unwrap_or(false);
            let payment_credit = record
                .get_str("transaction_category")
                .map(|c| c.to_lowercase().contains("payment/credit"))
                .unwrap_or(false);
            let positive_net = record
                .get_f64("net_transaction_amount")
                .map(|n| n > 0.0)
                .unwrap_or(false);
            Value::Bool(keyword || (payment_credit && positive_net))
        })
        .collect();

    dataset.add_column("is_refund", flags);
}

fn stamp_processed_at(dataset: &mut Dataset) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let values = vec![Value::String(timestamp); dataset.len()];
    dataset.add_column("processed_at", values);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Record;
    use serde_json::json;

    fn record(fields: &[(&str, Value)]) -> Record {
        let mut r = Record::new();
        for (k, v) in fields {
            r.insert(k, v.clone());
        }
        r
    }

    fn dataset_with_nets(nets: &[f64]) -> Dataset {
        let records = nets
            .iter()
            .map(|n| record(&[("net_transaction_amount", json!(n))]))
            .collect();
        Dataset::from_records(records)
    }

    #[test]
    fn test_net_amount_and_direction() {
        let mut ds = Dataset::from_records(vec![
            record(&[("credit_amount", json!(100.0)), ("debit_amount", json!(0.0))]),
            record(&[("credit_amount", json!(0.0)), ("debit_amount", json!(45.0))]),
            record(&[("credit_amount", json!(0.0)), ("debit_amount", json!(0.0))]),
            // debit stored as negative still reduces the net
            record(&[("credit_amount", json!(0.0)), ("debit_amount", json!(-45.0))]),
        ]);
        add_net_amount(&mut ds);

        let nets: Vec<f64> = ds
            .records()
            .iter()
            .map(|r| r.get_f64("net_transaction_amount").unwrap())
            .collect();
        assert_eq!(nets, vec![100.0, -45.0, 0.0, -45.0]);

        let directions: Vec<&str> = ds
            .records()
            .iter()
            .map(|r| r.get_str("transaction_direction").unwrap())
            .collect();
        assert_eq!(directions, vec!["credit", "debit", "neutral", "neutral"]);
    }

    #[test]
    fn test_size_bucket_boundaries_left_inclusive() {
        assert_eq!(size_bucket(0.0), "micro");
        assert_eq!(size_bucket(9.99), "micro");
        assert_eq!(size_bucket(10.0), "small");
        assert_eq!(size_bucket(45.0), "small");
        assert_eq!(size_bucket(50.0), "medium");
        assert_eq!(size_bucket(199.99), "medium");
        assert_eq!(size_bucket(200.0), "large");
        assert_eq!(size_bucket(1000.0), "very_large");
    }

    #[test]
    fn test_iqr_anomaly_flags_the_outlier() {
        let mut ds =
            dataset_with_nets(&[10.0, 11.0, 9.0, 10.0, 12.0, 10.0, 9.0, 11.0, 10.0, 1000.0]);
        add_anomaly_flags(&mut ds);

        let flags: Vec<bool> = ds
            .records()
            .iter()
            .map(|r| r.get_bool("is_anomaly").unwrap())
            .collect();
        assert_eq!(
            flags,
            vec![false, false, false, false, false, false, false, false, false, true]
        );
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.5), 2.5);
        assert_eq!(percentile(&values, 0.25), 1.75);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 1.0), 4.0);
    }

    #[test]
    fn test_temporal_features() {
        let mut ds = Dataset::from_records(vec![
            record(&[("transaction_date", json!("2024-03-15"))]),
            record(&[("transaction_date", json!("2024-03-31"))]),
            record(&[("transaction_date", json!("2024-04-01"))]),
            record(&[("transaction_date", Value::Null)]),
        ]);
        add_temporal_features(&mut ds);

        let friday = &ds.records()[0];
        assert_eq!(friday.get_f64("transaction_year"), Some(2024.0));
        assert_eq!(friday.get_f64("transaction_month"), Some(3.0));
        assert_eq!(friday.get_str("transaction_day_of_week"), Some("Friday"));
        assert_eq!(friday.get_f64("transaction_quarter"), Some(1.0));
        assert_eq!(friday.get_bool("is_weekend"), Some(false));
        assert_eq!(friday.get_f64("week_of_year"), Some(11.0));
        assert_eq!(friday.get_str("year_month"), Some("2024-03"));

        let month_end = &ds.records()[1];
        assert_eq!(month_end.get_bool("is_month_end"), Some(true));
        assert_eq!(month_end.get_bool("is_weekend"), Some(true)); // a Sunday

        let month_start = &ds.records()[2];
        assert_eq!(month_start.get_bool("is_month_start"), Some(true));
        assert_eq!(month_start.get_f64("transaction_quarter"), Some(2.0));

        let missing = &ds.records()[3];
        assert!(missing.is_null("transaction_year"));
        assert!(missing.is_null("transaction_day_of_week"));
        assert_eq!(missing.get_bool("is_weekend"), Some(false));
    }

    #[test]
    fn test_quality_score_deductions_and_bounds() {
        let mut ds = Dataset::from_records(vec![
            record(&[
                ("transaction_id", json!(1)),
                ("transaction_category", json!("Dining")),
                ("transaction_date", json!("2024-03-15")),
                ("credit_amount", json!(10.0)),
                ("debit_amount", json!(0.0)),
                ("transaction_description", json!("ok")),
            ]),
            // everything wrong at once: 100 - 60 - 15 - 5 = 20
            record(&[
                ("transaction_id", Value::Null),
                ("transaction_category", Value::Null),
                ("transaction_date", Value::Null),
                ("credit_amount", json!(0.0)),
                ("debit_amount", json!(0.0)),
                ("transaction_description", Value::Null),
            ]),
        ]);
        add_quality_scores(&mut ds);

        assert_eq!(ds.records()[0].get_f64("data_quality_score"), Some(100.0));
        assert_eq!(ds.records()[1].get_f64("data_quality_score"), Some(20.0));
    }

    #[test]
    fn test_business_flags() {
        let mut ds = Dataset::from_records(vec![record(&[
            ("transaction_category", json!("Fee/Interest Charge")),
            ("net_transaction_amount", json!(-600.0)),
        ])]);
        add_business_flags(&mut ds);

        let r = &ds.records()[0];
        assert_eq!(r.get_bool("is_fee_transaction"), Some(true));
        assert_eq!(r.get_bool("is_payment_transaction"), Some(false));
        assert_eq!(r.get_bool("is_large_transaction"), Some(true));
    }

    #[test]
    fn test_text_features_and_recurrence() {
        let mut ds = Dataset::from_records(vec![
            record(&[("transaction_description", json!("NETFLIX subscription"))]),
            record(&[("transaction_description", json!("netflix SUBSCRIPTION"))]),
            record(&[("transaction_description", json!("Netflix Subscription"))]),
            record(&[("transaction_description", json!("ATM withdrawal"))]),
            record(&[("transaction_description", json!("Batman movie"))]),
        ]);
        add_text_features(&mut ds);

        let first = &ds.records()[0];
        assert_eq!(first.get_bool("has_keyword_subscription"), Some(true));
        assert_eq!(first.get_f64("description_txn_count"), Some(3.0));
        assert_eq!(first.get_bool("is_recurring_description"), Some(true));

        let atm = &ds.records()[3];
        assert_eq!(atm.get_bool("has_atm"), Some(true));
        assert_eq!(atm.get_bool("is_recurring_description"), Some(false));

        // word-boundary match: "Batman" is not an ATM
        assert_eq!(ds.records()[4].get_bool("has_atm"), Some(false));
    }

    #[test]
    fn test_duplicate_candidates_round_to_two_decimals() {
        let base = |net: f64| {
            record(&[
                ("transaction_date", json!("2024-03-15")),
                ("transaction_description", json!("Coffee Shop")),
                ("net_transaction_amount", json!(net)),
            ])
        };
        let mut ds = Dataset::from_records(vec![
            base(-4.50),
            base(-4.50),
            base(-4.495), // rounds to -4.50
            base(-4.48),  // rounds to -4.48, not a duplicate
        ]);
        add_text_features(&mut ds);

        let flags: Vec<bool> = ds
            .records()
            .iter()
            .map(|r| r.get_bool("is_duplicate_candidate").unwrap())
            .collect();
        assert_eq!(flags, vec![true, true, true, false]);
    }

    #[test]
    fn test_category_zscore_degenerate_groups() {
        let mut ds = Dataset::from_records(vec![
            // single-member group: std undefined, z-score 0
            record(&[
                ("transaction_category", json!("Dining")),
                ("net_transaction_amount", json!(-45.0)),
            ]),
            // constant group: std 0, z-score 0
            record(&[
                ("transaction_category", json!("Merchandise")),
                ("net_transaction_amount", json!(-20.0)),
            ]),
            record(&[
                ("transaction_category", json!("Merchandise")),
                ("net_transaction_amount", json!(-20.0)),
            ]),
        ]);
        add_category_statistics(&mut ds);

        for r in ds.records() {
            assert_eq!(r.get_f64("cat_net_zscore"), Some(0.0));
        }
        assert!(ds.records()[0].is_null("cat_net_std"));
        assert_eq!(ds.records()[1].get_f64("cat_net_std"), Some(0.0));
        assert_eq!(ds.records()[0].get_f64("cat_net_mean"), Some(-45.0));
        assert_eq!(ds.records()[0].get_f64("spend_vs_category_mean"), Some(1.0));
    }

    #[test]
    fn test_category_zscore_real_spread() {
        let mut ds = Dataset::from_records(vec![
            record(&[
                ("transaction_category", json!("Dining")),
                ("net_transaction_amount", json!(-10.0)),
            ]),
            record(&[
                ("transaction_category", json!("Dining")),
                ("net_transaction_amount", json!(-20.0)),
            ]),
            record(&[
                ("transaction_category", json!("Dining")),
                ("net_transaction_amount", json!(-30.0)),
            ]),
        ]);
        add_category_statistics(&mut ds);

        // mean -20, sample std 10
        assert_eq!(ds.records()[0].get_f64("cat_net_zscore"), Some(1.0));
        assert_eq!(ds.records()[1].get_f64("cat_net_zscore"), Some(0.0));
        assert_eq!(ds.records()[2].get_f64("cat_net_zscore"), Some(-1.0));
    }

    #[test]
    fn test_days_since_prev_same_desc_restores_row_order() {
        let mut ds = Dataset::from_records(vec![
            record(&[
                ("transaction_description", json!("Gym")),
                ("transaction_date", json!("2024-03-20")),
            ]),
            record(&[
                ("transaction_description", json!("Coffee")),
                ("transaction_date", json!("2024-03-01")),
            ]),
            record(&[
                ("transaction_description", json!("gym")),
                ("transaction_date", json!("2024-03-10")),
            ]),
            record(&[
                ("transaction_description", json!("Coffee")),
                ("transaction_date", json!("2024-03-05")),
            ]),
        ]);
        add_days_since_prev_same_desc(&mut ds);

        // row 0 ("Gym" on 03-20) follows row 2 ("gym" on 03-10): 10 days
        assert_eq!(ds.records()[0].get_f64("days_since_prev_same_desc"), Some(10.0));
        assert!(ds.records()[1].is_null("days_since_prev_same_desc"));
        assert!(ds.records()[2].is_null("days_since_prev_same_desc"));
        assert_eq!(ds.records()[3].get_f64("days_since_prev_same_desc"), Some(4.0));
    }

    #[test]
    fn test_refund_flag_from_payment_credit_category() {
        let mut ds = Dataset::from_records(vec![
            record(&[
                ("transaction_category", json!("Payment/Credit")),
                ("net_transaction_amount", json!(120.0)),
            ]),
            record(&[
                ("transaction_category", json!("Payment/Credit")),
                ("net_transaction_amount", json!(-120.0)),
            ]),
            record(&[
                ("transaction_category", json!("Dining")),
                ("net_transaction_amount", json!(5.0)),
                ("has_refund_keyword", json!(true)),
            ]),
        ]);
        add_refund_flags(&mut ds);

        assert_eq!(ds.records()[0].get_bool("is_refund"), Some(true));
        assert_eq!(ds.records()[1].get_bool("is_refund"), Some(false));
        assert_eq!(ds.records()[2].get_bool("is_refund"), Some(true));
    }
}
