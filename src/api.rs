//! Synchronous client for the MFDS **narcotic production / import-export performance**
//! service on the Korean public data portal (apis.data.go.kr).
//!
//! The service pages through an unknown number of records. [`Client::fetch_raw_data`]
//! walks the pages until the reported last page, an optional page cap, an empty
//! page, or the first failure, and always hands back what it collected.
//!
//! ### Notes
//! - The portal reports `totalCount` / `numOfRows` as numbers or strings; both are accepted.
//! - `numOfRows` is capped at 500 by the provider.
//! - Result code `"00"` is the only success code. A response without any result code
//!   is treated as success.
//! - Network timeouts use a sane default (30s).
//!
//! Typical usage:
//! ```no_run
//! # use nark_pfmc::{Client, FetchQuery};
//! let client = Client::new(std::env::var("NARK_SERVICE_KEY").ok())?;
//! let outcome = client.fetch_raw_data(&FetchQuery {
//!     year: Some("2023".into()),
//!     ..FetchQuery::default()
//! });
//! println!("{} records over {} pages", outcome.records.len(), outcome.pages_requested);
//! # Ok::<(), anyhow::Error>(())
//! ```
use crate::models::{Envelope, EnvelopeError, FIELD_ITEM_NAME, FIELD_YEAR, RawRecord};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str =
    "http://apis.data.go.kr/1471000/NarkProdPfmcService/getNarkProdPfmcInq";

/// Largest `numOfRows` the provider accepts.
pub const MAX_ROWS_PER_PAGE: u32 = 500;

/// Pause between successful pages.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(200);

/// How much of an unexpected body ends up in logs and errors.
const SNIPPET_CHARS: usize = 500;

/// Raw HTTP answer handed back by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    /// Only a plain `200 OK` carries a page.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Issues one GET. Kept behind a trait so the paging loop can run against scripted answers.
pub trait Transport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<RawResponse, TransportError>;
}

/// Blocking reqwest transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30)) // total request timeout
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(5))
            .user_agent(concat!("nark_pfmc/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build reqwest client")?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<RawResponse, TransportError> {
        let resp = self.http.get(url).query(query).send()?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        Ok(RawResponse { status, body })
    }
}

/// What to ask the service for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    /// Item name substring (`ITEM_NAME`), e.g. `"코데날"`.
    pub item_name: Option<String>,
    /// Performance year (`PFMC_YMD`), e.g. `"2023"`.
    pub year: Option<String>,
    /// Records per page; clamped to `1..=500`.
    pub rows_per_page: u32,
    /// Stop after this many pages. `None` and `Some(0)` mean no cap.
    pub max_pages: Option<u32>,
}

impl Default for FetchQuery {
    fn default() -> Self {
        Self {
            item_name: None,
            year: None,
            rows_per_page: MAX_ROWS_PER_PAGE,
            max_pages: None,
        }
    }
}

impl FetchQuery {
    fn effective_rows(&self) -> u32 {
        if self.rows_per_page > MAX_ROWS_PER_PAGE {
            warn!(
                "numOfRows is capped at {}; reducing {} to {}",
                MAX_ROWS_PER_PAGE, self.rows_per_page, MAX_ROWS_PER_PAGE
            );
            MAX_ROWS_PER_PAGE
        } else if self.rows_per_page == 0 {
            warn!("numOfRows must be positive; using 1");
            1
        } else {
            self.rows_per_page
        }
    }

    fn page_cap(&self) -> Option<u32> {
        self.max_pages.filter(|n| *n > 0)
    }
}

/// Normal ways for the paging loop to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The reported last page was reached.
    LastPage,
    /// `max_pages` was reached.
    PageCap,
    /// A page came back without items (no data, or nothing matches the filters).
    NoItems,
}

/// Failures that stop the paging loop early. Never surfaced as `Err` from a fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("transport error on page {page}: {message}")]
    Transport { page: u32, message: String },
    #[error("HTTP {status} on page {page}: {snippet}")]
    HttpStatus { page: u32, status: u16, snippet: String },
    #[error("could not decode JSON on page {page}: {message}")]
    Parse { page: u32, message: String },
    #[error("unexpected envelope on page {page}: {source}")]
    Envelope { page: u32, source: EnvelopeError },
    #[error("provider error on page {page}: resultCode={code}, resultMsg={}", .msg.as_deref().unwrap_or(""))]
    Provider { page: u32, code: String, msg: Option<String> },
}

/// Everything a fetch produced, including why it stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    /// Number of GET requests issued.
    pub pages_requested: u32,
    pub termination: Result<Completion, FetchFailure>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.termination.is_ok()
    }
}

/// States of the paging loop. Each stop cause has exactly one transition into
/// `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    Fetching { page: u32 },
    Done(Completion),
    Error(FetchFailure),
}

#[derive(Debug, Clone)]
pub struct Client<T = HttpTransport> {
    pub base_url: String,
    service_key: Option<String>,
    page_delay: Duration,
    transport: T,
}

impl Client<HttpTransport> {
    /// Client over HTTP for the default endpoint.
    ///
    /// `service_key` is the portal's decoded ("일반 인증키 (Decoding)") key; it is
    /// URL-encoded on the way out. Without a key the provider answers with an error
    /// code and the fetch stops on the first page.
    pub fn new(service_key: Option<String>) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new()?).with_service_key(service_key))
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            service_key: None,
            page_delay: DEFAULT_PAGE_DELAY,
            transport,
        }
    }

    pub fn with_service_key(mut self, key: Option<String>) -> Self {
        self.service_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn query_params(&self, q: &FetchQuery, page: u32, rows: u32) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(6);
        if let Some(key) = &self.service_key {
            params.push(("serviceKey", key.clone()));
        }
        params.push(("type", "json".to_string()));
        params.push(("pageNo", page.to_string()));
        params.push(("numOfRows", rows.to_string()));
        if let Some(name) = q.item_name.as_deref().filter(|s| !s.is_empty()) {
            params.push((FIELD_ITEM_NAME, name.to_string()));
        }
        if let Some(year) = q.year.as_deref().filter(|s| !s.is_empty()) {
            params.push((FIELD_YEAR, year.to_string()));
        }
        params
    }

    /// Fetch every page matching `q`.
    ///
    /// Never fails: HTTP errors, undecodable bodies, provider error codes and empty
    /// pages all end the loop, and the records gathered up to that point are returned
    /// together with the reason in [`FetchOutcome::termination`].
    pub fn fetch_raw_data(&self, q: &FetchQuery) -> FetchOutcome {
        let rows = q.effective_rows();
        let cap = q.page_cap();
        let mut records: Vec<RawRecord> = Vec::new();
        let mut pages_requested = 0u32;

        let mut state = FetchState::Fetching { page: 1 };
        let termination = loop {
            state = match state {
                FetchState::Fetching { page } => {
                    pages_requested += 1;
                    let next = self.fetch_page(q, page, rows, cap, &mut records);
                    if matches!(next, FetchState::Fetching { .. }) && !self.page_delay.is_zero() {
                        std::thread::sleep(self.page_delay);
                    }
                    next
                }
                FetchState::Done(c) => break Ok(c),
                FetchState::Error(f) => break Err(f),
            };
        };

        match &termination {
            Ok(Completion::LastPage) => info!("collected all pages ({} records)", records.len()),
            Ok(Completion::PageCap) => info!("stopped at max_pages ({} records)", records.len()),
            Ok(Completion::NoItems) => info!(
                "items empty: no data or nothing matches the filters ({} records)",
                records.len()
            ),
            Err(e) => error!("stopped early: {} ({} records kept)", e, records.len()),
        }
        if records.is_empty() {
            warn!("no records collected");
        }

        FetchOutcome {
            records,
            pages_requested,
            termination,
        }
    }

    /// One transition of the paging loop, starting from `Fetching { page }`.
    fn fetch_page(
        &self,
        q: &FetchQuery,
        page: u32,
        rows: u32,
        cap: Option<u32>,
        acc: &mut Vec<RawRecord>,
    ) -> FetchState {
        let params = self.query_params(q, page, rows);
        let resp = match self.transport.get(&self.base_url, &params) {
            Ok(r) => r,
            Err(e) => {
                return FetchState::Error(FetchFailure::Transport {
                    page,
                    message: e.to_string(),
                });
            }
        };
        debug!("HTTP status = {}, page = {}", resp.status, page);

        if !resp.is_success() {
            return FetchState::Error(FetchFailure::HttpStatus {
                page,
                status: resp.status,
                snippet: snippet(&resp.body),
            });
        }

        let v: Value = match serde_json::from_str(&resp.body) {
            Ok(v) => v,
            Err(e) => {
                debug!("undecodable body: {}", snippet(&resp.body));
                return FetchState::Error(FetchFailure::Parse {
                    page,
                    message: e.to_string(),
                });
            }
        };

        let env = match Envelope::unwrap(&v) {
            Ok(env) => env,
            Err(source) => return FetchState::Error(FetchFailure::Envelope { page, source }),
        };

        if let Some(code) = &env.header.result_code {
            debug!(
                "resultCode={}, resultMsg={}",
                code,
                env.header.result_msg.as_deref().unwrap_or("")
            );
        }
        if !env.header.is_success() {
            return FetchState::Error(FetchFailure::Provider {
                page,
                code: env.header.result_code.clone().unwrap_or_default(),
                msg: env.header.result_msg.clone(),
            });
        }

        let Some((items, skipped)) = env.items() else {
            return FetchState::Done(Completion::NoItems);
        };
        if skipped > 0 {
            warn!("page {}: skipped {} item(s) that were not objects", page, skipped);
        }
        acc.extend(items);

        let total = env.total_count(acc.len() as u64);
        let per_page = env.num_of_rows(u64::from(rows));
        let last_page = last_page(total, per_page);
        info!(
            "page {}/{} collected ({} records so far)",
            page,
            last_page,
            acc.len()
        );

        if cap.is_some_and(|n| page >= n) {
            FetchState::Done(Completion::PageCap)
        } else if u64::from(page) >= last_page {
            FetchState::Done(Completion::LastPage)
        } else {
            FetchState::Fetching { page: page + 1 }
        }
    }
}

/// `ceil(total / per_page)`, or 1 when the page size is unusable.
pub fn last_page(total: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        1
    } else {
        total.div_ceil(per_page)
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_CHARS).collect()
}
