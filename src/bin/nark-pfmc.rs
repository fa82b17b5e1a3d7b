use anyhow::Result;
use clap::{Parser, ValueEnum};
use nark_pfmc::api::{DEFAULT_BASE_URL, MAX_ROWS_PER_PAGE};
use nark_pfmc::models::{FIELD_ITEM_NAME, FIELD_PRMSN_QTY, FIELD_PROD_QTY, FIELD_YEAR, YearSummary};
use nark_pfmc::{Client, FetchQuery, RawRecord};
use nark_pfmc::{stats, storage};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "nark-pfmc",
    version,
    about = "Fetch MFDS narcotic production/import-export records and summarize them per year"
)]
struct Cli {
    /// data.go.kr service key (decoded form).
    #[arg(long, env = "NARK_SERVICE_KEY", hide_env_values = true)]
    service_key: Option<String>,
    /// Item name substring filter (ITEM_NAME), e.g. 코데날
    #[arg(long)]
    item_name: Option<String>,
    /// Performance year filter (PFMC_YMD), e.g. 2023
    #[arg(long)]
    year: Option<String>,
    /// Records per page (the service allows at most 500).
    #[arg(long, default_value_t = MAX_ROWS_PER_PAGE)]
    rows: u32,
    /// Stop after this many pages.
    #[arg(long)]
    max_pages: Option<u32>,
    /// Where to write the per-year summary CSV.
    #[arg(long, default_value = "narcotics_year_summary.csv")]
    out: PathBuf,
    /// Also save the raw records (.json or .csv).
    #[arg(long)]
    raw_out: Option<PathBuf>,
    /// Format for --raw-out. If omitted, inferred from its extension.
    #[arg(long, value_enum, requires = "raw_out")]
    raw_format: Option<RawFormat>,
    /// Number of rows shown in the previews.
    #[arg(long, default_value_t = 5)]
    preview: usize,
    /// Service endpoint.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RawFormat {
    Csv,
    Json,
}

fn fmt_cell(v: Option<&serde_json::Value>) -> String {
    storage::cell_text(v, "NA")
}

fn print_records(records: &[RawRecord], n: usize) {
    for r in records.iter().take(n) {
        println!(
            "{} | {} | PROD_QTY={} PRMSN_QTY={}",
            fmt_cell(r.get(FIELD_YEAR)),
            fmt_cell(r.get(FIELD_ITEM_NAME)),
            fmt_cell(r.get(FIELD_PROD_QTY)),
            fmt_cell(r.get(FIELD_PRMSN_QTY)),
        );
    }
}

fn print_summary(rows: &[YearSummary], n: usize) {
    println!("{:>6}  {:>16}  {:>16}", "year", "prod_qty_sum", "prmsn_qty_sum");
    for s in rows.iter().take(n) {
        println!(
            "{:>6}  {:>16}  {:>16}",
            s.year,
            storage::fmt_qty(s.prod_qty_sum),
            storage::fmt_qty(s.prmsn_qty_sum)
        );
    }
}

fn raw_format(path: &Path, explicit: Option<RawFormat>) -> Result<RawFormat> {
    if let Some(f) = explicit {
        return Ok(f);
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("csv")
        .to_ascii_lowercase();
    match ext.as_str() {
        "json" => Ok(RawFormat::Json),
        "csv" => Ok(RawFormat::Csv),
        other => anyhow::bail!(
            "unsupported raw output format: {} (use .csv/.json or --raw-format)",
            other
        ),
    }
}

fn save_raw(records: &[RawRecord], path: &Path, format: RawFormat) -> Result<()> {
    match format {
        RawFormat::Json => storage::save_records_json(records, path)?,
        RawFormat::Csv => storage::save_records_csv(records, path)?,
    }
    eprintln!("Saved {} raw records to {}", records.len(), path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let raw_out = match cli.raw_out {
        Some(path) => {
            let format = raw_format(&path, cli.raw_format)?;
            Some((path, format))
        }
        None => None,
    };

    if cli.service_key.is_none() {
        log::warn!("no service key given (--service-key or NARK_SERVICE_KEY); the service will likely reject the request");
    }

    let client = Client::new(cli.service_key)?.with_base_url(cli.base_url);
    let query = FetchQuery {
        item_name: cli.item_name,
        year: cli.year,
        rows_per_page: cli.rows,
        max_pages: cli.max_pages,
    };

    let outcome = client.fetch_raw_data(&query);
    println!(
        "Fetched {} records over {} page request(s)",
        outcome.records.len(),
        outcome.pages_requested
    );
    print_records(&outcome.records, cli.preview);

    let summary = stats::aggregate_by_year(&outcome.records, &cli.out)?;
    eprintln!("Saved {} year rows to {}", summary.len(), cli.out.display());
    print_summary(&summary, cli.preview);

    if let Some((path, format)) = raw_out
        && let Err(e) = save_raw(&outcome.records, &path, format)
    {
        log::error!("could not save raw records to {}: {:#}", path.display(), e);
    }

    Ok(())
}
