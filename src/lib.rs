//! nark_pfmc
//!
//! A small Rust library for retrieving the MFDS narcotic production / import-export
//! performance records from the Korean public data portal and summarizing them per
//! year. Pairs with the `nark-pfmc` CLI.
//!
//! ### Features
//! - Walk every page of the service, optionally filtered by item name and year
//! - Keep going until the reported last page, a page cap, or the first failure
//! - Sum production and permitted quantities per year
//! - Save the summary as UTF-8 (BOM) CSV, and the raw records as CSV or JSON
//!
//! ### Example
//! ```no_run
//! use nark_pfmc::{Client, FetchQuery};
//!
//! let client = Client::new(std::env::var("NARK_SERVICE_KEY").ok())?;
//! let outcome = client.fetch_raw_data(&FetchQuery::default());
//! let summary = nark_pfmc::stats::aggregate_by_year(&outcome.records, "year_summary.csv")?;
//! println!("{:#?}", summary);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod api;
pub mod models;
pub mod stats;
pub mod storage;

pub use api::{Client, Completion, FetchFailure, FetchOutcome, FetchQuery, Transport};
pub use models::{RawRecord, YearSummary};
