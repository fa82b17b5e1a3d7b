use crate::models::{FIELD_PRMSN_QTY, FIELD_PROD_QTY, FIELD_YEAR, Numeric, RawRecord, YearSummary};
use crate::storage;
use anyhow::Result;
use log::{info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Default output path when the caller does not name one.
pub const DEFAULT_SUMMARY_PATH: &str = "year_summary.csv";

/// Coerce a field to a number, or return `fallback` when that fails.
///
/// Missing keys, `null`, non-numeric strings and non-finite numbers all count
/// as failures. The year uses `None` (record dropped), quantities use `Some(0.0)`.
pub fn parse_numeric_or(v: Option<&Value>, fallback: Option<f64>) -> Option<f64> {
    match Numeric::from_value(v) {
        Numeric::Value(x) => Some(x),
        Numeric::Absent | Numeric::Invalid => fallback,
    }
}

/// Truncate toward zero; `None` when the result does not fit an `i64`.
fn whole_year(x: f64) -> Option<i64> {
    let t = x.trunc();
    (t >= i64::MIN as f64 && t < i64::MAX as f64).then_some(t as i64)
}

/// Sum `PROD_QTY` and `PRMSN_QTY` per integer `PFMC_YMD`, ascending by year.
///
/// Records whose year cannot be read are left out entirely; unreadable
/// quantities count as zero.
pub fn year_summary(records: &[RawRecord]) -> Vec<YearSummary> {
    let mut groups: BTreeMap<i64, (f64, f64)> = BTreeMap::new();
    let mut dropped = 0usize;
    for r in records {
        let Some(year) = parse_numeric_or(r.get(FIELD_YEAR), None).and_then(whole_year) else {
            dropped += 1;
            continue;
        };
        let prod = parse_numeric_or(r.get(FIELD_PROD_QTY), Some(0.0)).unwrap_or(0.0);
        let prmsn = parse_numeric_or(r.get(FIELD_PRMSN_QTY), Some(0.0)).unwrap_or(0.0);
        let sums = groups.entry(year).or_default();
        sums.0 += prod;
        sums.1 += prmsn;
    }
    if dropped > 0 {
        warn!("{} record(s) without a usable {} were left out", dropped, FIELD_YEAR);
    }

    groups
        .into_iter()
        .map(|(year, (prod_qty_sum, prmsn_qty_sum))| YearSummary {
            year,
            prod_qty_sum,
            prmsn_qty_sum,
        })
        .collect()
}

/// Build the year summary and write it as CSV to `path`.
///
/// An empty input still produces a file with just the header row.
pub fn aggregate_by_year<P: AsRef<Path>>(records: &[RawRecord], path: P) -> Result<Vec<YearSummary>> {
    let path = path.as_ref();
    if records.is_empty() {
        warn!("no input records; writing an empty summary");
    }
    let summary = year_summary(records);
    storage::save_summary_csv(&summary, path)?;
    info!("wrote {} year row(s) to {}", summary.len(), path.display());
    Ok(summary)
}
