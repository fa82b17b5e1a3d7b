use crate::models::{RawRecord, YearSummary};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Byte-order mark so spreadsheet tools pick UTF-8 for Korean text.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const SUMMARY_HEADER: [&str; 3] = ["year", "prod_qty_sum", "prmsn_qty_sum"];

fn create_with_bom(path: &Path) -> Result<BufWriter<File>> {
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    w.write_all(UTF8_BOM)?;
    Ok(w)
}

/// Whole sums print as integers (`13`), everything else at full precision.
pub fn fmt_qty(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 9.0e15 {
        format!("{}", x as i64)
    } else {
        x.to_string()
    }
}

/// Save the year summary as UTF-8 CSV with BOM and header, no index column.
pub fn save_summary_csv<P: AsRef<Path>>(rows: &[YearSummary], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new().from_writer(create_with_bom(path)?);
    wtr.write_record(SUMMARY_HEADER)?;
    for r in rows {
        wtr.write_record([
            r.year.to_string(),
            fmt_qty(r.prod_qty_sum),
            fmt_qty(r.prmsn_qty_sum),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a summary CSV written by [`save_summary_csv`]. A leading BOM is skipped.
pub fn read_summary_csv<P: AsRef<Path>>(path: P) -> Result<Vec<YearSummary>> {
    let path = path.as_ref();
    let mut raw = Vec::new();
    File::open(path)
        .with_context(|| format!("open {}", path.display()))?
        .read_to_end(&mut raw)?;
    let data = raw.strip_prefix(UTF8_BOM).unwrap_or(&raw);

    let mut rdr = csv::Reader::from_reader(data);
    let mut out = Vec::new();
    for row in rdr.deserialize() {
        let row: YearSummary = row.with_context(|| format!("parse {}", path.display()))?;
        out.push(row);
    }
    Ok(out)
}

/// Save the raw records as a pretty JSON array.
pub fn save_records_json<P: AsRef<Path>>(records: &[RawRecord], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let s = serde_json::to_string_pretty(records)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

/// Save the raw records as CSV (with BOM).
///
/// Columns are the union of all keys in first-seen order; missing cells stay empty.
pub fn save_records_csv<P: AsRef<Path>>(records: &[RawRecord], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut columns: Vec<&str> = Vec::new();
    for r in records {
        for k in r.0.keys() {
            if !columns.contains(&k.as_str()) {
                columns.push(k);
            }
        }
    }

    let mut wtr = WriterBuilder::new().from_writer(create_with_bom(path)?);
    if !columns.is_empty() {
        wtr.write_record(&columns)?;
    }
    for r in records {
        wtr.write_record(columns.iter().map(|c| cell_text(r.get(c), "")))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Display text of a raw field; `missing` stands in for absent keys and `null`.
pub fn cell_text(v: Option<&Value>, missing: &str) -> String {
    match v {
        None | Some(Value::Null) => missing.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn summary_csv_starts_with_bom() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("s.csv");
        let rows = vec![YearSummary { year: 2022, prod_qty_sum: 13.0, prmsn_qty_sum: 2.5 }];
        save_summary_csv(&rows, &p).unwrap();
        let bytes = std::fs::read(&p).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(text, "year,prod_qty_sum,prmsn_qty_sum\n2022,13,2.5\n");
        assert_eq!(read_summary_csv(&p).unwrap(), rows);
    }

    #[test]
    fn raw_csv_uses_union_of_columns() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("raw.csv");
        let recs: Vec<RawRecord> = serde_json::from_value(json!([
            {"ITEM_NAME": "코데날정", "PROD_QTY": "10"},
            {"ITEM_NAME": "B", "PFMC_YMD": 2023}
        ]))
        .unwrap();
        save_records_csv(&recs, &p).unwrap();
        let text = std::fs::read_to_string(&p).unwrap();
        let text = text.trim_start_matches('\u{feff}');
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "코데날정,10,");
        assert_eq!(lines[2], "B,,2023");
    }

    #[test]
    fn json_write_error_names_the_path() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("missing").join("raw.json");
        let err = save_records_json(&[], &p).unwrap_err();
        assert!(format!("{err:#}").contains("create"), "{err:#}");
        assert!(format!("{err:#}").contains("raw.json"), "{err:#}");
    }

    #[test]
    fn cell_text_uses_placeholder_for_missing() {
        assert_eq!(cell_text(None, "NA"), "NA");
        assert_eq!(cell_text(Some(&json!(null)), ""), "");
        assert_eq!(cell_text(Some(&json!("코데날")), "NA"), "코데날");
        assert_eq!(cell_text(Some(&json!(12)), "NA"), "12");
    }
}
