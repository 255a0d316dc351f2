use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::csv_line::parse_line;
use crate::error::SyncError;
use crate::record::Record;
use crate::sheet_link;
use crate::state::InventoryState;

/// Minimum number of non-blank lines: a header plus one data row.
const MIN_LINES: usize = 2;

pub trait SheetFetcher: Send + Sync {
    /// GETs `url` and returns the body of a successful response.
    fn fetch(&self, url: &str) -> Result<String, SyncError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SyncError::Unreachable(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

impl SheetFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, SyncError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| SyncError::Unreachable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Unreachable(format!("HTTP {status}")));
        }

        response
            .text()
            .map_err(|err| SyncError::Unreachable(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// User triggered: sets the busy flag and reports a status message.
    Interactive,
    /// Timer triggered: failures are only logged.
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Replaced { records: usize },
    Unchanged { records: usize },
}

impl SyncOutcome {
    pub fn records(&self) -> usize {
        match self {
            SyncOutcome::Replaced { records } | SyncOutcome::Unchanged { records } => *records,
        }
    }
}

/// A private sheet answers the export URL with its sign-in page.
pub fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    let head = head.get(..16).unwrap_or(head).to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Turns an export body into records: drops blank lines and the header,
/// parses each row and keeps rows with at least two columns.
pub fn parse_export(body: &str, ingested_at: DateTime<Utc>) -> Result<Vec<Record>, SyncError> {
    if looks_like_html(body) {
        return Err(SyncError::AccessDenied);
    }

    let lines: Vec<&str> = body.lines().filter(|line| !line.trim().is_empty()).collect();
    if lines.len() < MIN_LINES {
        return Err(SyncError::EmptySource);
    }

    let records: Vec<Record> = lines[1..]
        .iter()
        .enumerate()
        .filter_map(|(index, line)| Record::from_columns(&parse_line(line), index, ingested_at))
        .collect();

    debug!(
        rows = lines.len() - 1,
        records = records.len(),
        "parsed sheet export"
    );

    if records.is_empty() {
        return Err(SyncError::NoRecordsExtracted);
    }
    Ok(records)
}

/// Validates and normalizes `link`, downloads the export and parses it.
/// Touches no state, so it can run on a worker thread.
pub fn fetch_collection(
    fetcher: &dyn SheetFetcher,
    link: &str,
    ingested_at: DateTime<Utc>,
) -> Result<Vec<Record>, SyncError> {
    let url = sheet_link::export_url(link)?;
    debug!(%url, "fetching sheet export");
    let body = fetcher.fetch(&url)?;
    parse_export(&body, ingested_at)
}

/// Runs a whole sync against `state` on the calling thread.
pub fn sync(
    fetcher: &dyn SheetFetcher,
    state: &mut InventoryState,
    mode: SyncMode,
    now: DateTime<Utc>,
) -> Result<SyncOutcome, SyncError> {
    state.begin_sync(mode);
    let link = state.source_link().to_string();
    let result = fetch_collection(fetcher, &link, now);
    let outcome = state.finish_sync(mode, result, now);
    if let Ok(outcome) = &outcome {
        info!(?mode, ?outcome, "sync finished");
    }
    outcome
}
