//! End-to-end fetch pipeline: destination → index → candidates → downloads.

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{info, instrument, warn};

use nimefetch_discovery::{HtmlParser, MarkupParser};
use nimefetch_downloader::{Downloader, filename_from_url};
use nimefetch_shared::{DownloadOutcome, FetchConfig, NimeFetchError, Result, RunSummary};

use crate::destination::{DestinationStatus, prepare_destination};

/// User-Agent string for all requests.
const USER_AGENT: &str = concat!("nimefetch/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed per request.
const MAX_REDIRECTS: usize = 5;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the destination directory is usable.
    fn destination_ready(&self, path: &std::path::Path, status: DestinationStatus);
    /// Called after the index has been scanned.
    fn candidates_found(&self, year: u32, count: usize);
    /// Called right before a candidate's request is sent (1-based `current`).
    /// Candidates settled without a request only reach `file_finished`.
    fn file_started(&self, filename: &str, current: usize, total: usize);
    /// Called with the terminal state of a candidate.
    fn file_finished(&self, outcome: &DownloadOutcome, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn destination_ready(&self, _path: &std::path::Path, _status: DestinationStatus) {}
    fn candidates_found(&self, _year: u32, _count: usize) {}
    fn file_started(&self, _filename: &str, _current: usize, _total: usize) {}
    fn file_finished(&self, _outcome: &DownloadOutcome, _current: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Build the HTTP client shared by the index fetch and all downloads.
///
/// Index and download timeouts differ and bound each wait rather than the
/// whole request, so none is set here.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|e| NimeFetchError::config(format!("failed to build HTTP client: {e}")))
}

/// Run the full pipeline with the HTML parser.
pub async fn fetch_papers(
    config: &FetchConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    fetch_papers_with(config, &HtmlParser, progress).await
}

/// Run the full pipeline.
///
/// 1. Prepare the destination directory (fatal on failure)
/// 2. Fetch and scan the index page (fatal on failure)
/// 3. Download each candidate in order (per-file failures are recorded, not returned)
///
/// An index without matching papers is a successful run with zero candidates.
#[instrument(skip_all, fields(year = config.target_year, index = %config.papers_index_url))]
pub async fn fetch_papers_with(
    config: &FetchConfig,
    parser: &dyn MarkupParser,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();
    let destination = config.destination_dir();

    let mut summary = RunSummary {
        destination: destination.clone(),
        year: config.target_year,
        ..RunSummary::default()
    };

    // --- Phase 1: Destination ---
    progress.phase("Preparing destination");
    let status = prepare_destination(&destination)?;
    progress.destination_ready(&destination, status);

    // --- Phase 2: Discovery ---
    progress.phase("Fetching papers index");
    let client = build_client()?;
    let candidates = nimefetch_discovery::discover(&client, config, parser).await?;

    summary.candidates = candidates.len();
    progress.candidates_found(config.target_year, candidates.len());

    if candidates.is_empty() {
        info!("no papers found for target year");
        return Ok(finish(summary, start.elapsed(), progress));
    }

    // --- Phase 3: Download ---
    progress.phase("Downloading papers");
    let downloader = Downloader::new(client, &destination, config.download_timeout);
    let total = candidates.len();

    for (i, url) in candidates.iter().enumerate() {
        let outcome = match downloader.precheck(url) {
            Some(settled) => settled,
            None => {
                let filename = filename_from_url(url).unwrap_or_else(|| url.to_string());
                progress.file_started(&filename, i + 1, total);
                downloader.download(url).await
            }
        };
        if let DownloadOutcome::Failed { filename, message } = &outcome {
            warn!(%filename, %message, "paper not downloaded");
        }

        summary.record(&outcome);
        progress.file_finished(&outcome, i + 1, total);
    }

    Ok(finish(summary, start.elapsed(), progress))
}

fn finish(mut summary: RunSummary, elapsed: Duration, progress: &dyn ProgressReporter) -> RunSummary {
    summary.elapsed = elapsed;

    info!(
        candidates = summary.candidates,
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = summary.failures.len(),
        bytes = summary.bytes_written,
        elapsed_ms = summary.elapsed.as_millis(),
        "fetch completed"
    );

    progress.done(&summary);
    summary
}
