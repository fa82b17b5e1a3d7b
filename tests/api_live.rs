//! Live API tests. Run with: `NARK_SERVICE_KEY=... cargo test --features online -- --nocapture`
#![cfg(feature = "online")]

use nark_pfmc::{Client, Completion, FetchQuery};

#[test]
fn fetch_two_small_pages() {
    let cli = Client::new(std::env::var("NARK_SERVICE_KEY").ok()).unwrap();
    let out = cli.fetch_raw_data(&FetchQuery {
        rows_per_page: 5,
        max_pages: Some(2),
        ..FetchQuery::default()
    });
    assert!(out.is_complete(), "{:?}", out.termination);
    assert!(out.pages_requested <= 2);
    assert!(out.records.len() <= 10);
    if out.termination == Ok(Completion::PageCap) {
        assert_eq!(out.records.len(), 10);
    }
}

#[test]
fn fetch_filtered_by_year() {
    let cli = Client::new(std::env::var("NARK_SERVICE_KEY").ok()).unwrap();
    let out = cli.fetch_raw_data(&FetchQuery {
        year: Some("2022".into()),
        rows_per_page: 20,
        max_pages: Some(1),
        ..FetchQuery::default()
    });
    assert!(out.is_complete(), "{:?}", out.termination);
    let summary = nark_pfmc::stats::year_summary(&out.records);
    assert!(summary.iter().all(|s| s.year == 2022));
}
