//! Paper discovery: fetch the proceedings index and pick out the PDF links.
//!
//! The index is a single HTML page. Every anchor whose `href` contains the
//! `/{year}/` segment and ends in `.pdf` becomes a candidate, resolved against
//! the site base URL and deduplicated in order of first appearance.

mod parser;

use std::time::Duration;

use nimefetch_shared::{CandidateList, FetchConfig, NimeFetchError, Result, error_chain};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use parser::{HtmlParser, MarkupParser, TagRecord};

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Fetch the index page and return the candidate paper URLs for the configured year.
///
/// Any network failure or non-2xx status is returned as a fatal fetch error.
#[instrument(skip_all, fields(url = %config.papers_index_url, year = config.target_year))]
pub async fn discover(
    client: &Client,
    config: &FetchConfig,
    parser: &dyn MarkupParser,
) -> Result<CandidateList> {
    let markup = fetch_index(client, &config.papers_index_url, config.index_timeout).await?;
    let candidates =
        extract_candidates(&markup, parser, config.target_year, &config.site_base_url);

    info!(candidates = candidates.len(), "index scanned");
    Ok(candidates)
}

/// GET the index page as text.
///
/// `timeout` bounds the wait for the response headers and each wait for the
/// next body chunk, not the transfer as a whole.
pub async fn fetch_index(client: &Client, url: &Url, timeout: Duration) -> Result<String> {
    info!(%url, "fetching papers index");
    let fail = |msg: String| NimeFetchError::fetch(format!("{url}: {msg}"));

    let mut response = tokio::time::timeout(timeout, client.get(url.as_str()).send())
        .await
        .map_err(|_| fail(format!("timed out after {timeout:?} waiting for a response")))?
        .map_err(|e| fail(error_chain(&e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fail(format!("HTTP {status}")));
    }

    let mut body = Vec::new();
    loop {
        let next = tokio::time::timeout(timeout, response.chunk())
            .await
            .map_err(|_| fail(format!("timed out after {timeout:?} reading body")))?
            .map_err(|e| fail(format!("failed to read body: {}", error_chain(&e))))?;
        match next {
            Some(chunk) => body.extend_from_slice(&chunk),
            None => break,
        }
    }

    debug!(bytes = body.len(), "index page received");
    Ok(String::from_utf8_lossy(&body).into_owned())
}

// ---------------------------------------------------------------------------
// Link selection
// ---------------------------------------------------------------------------

/// Whether `href` points at a paper from `year`.
///
/// Plain substring match on `/{year}/` (case-sensitive) anywhere in the href,
/// plus a case-insensitive `.pdf` suffix.
pub fn is_candidate_href(href: &str, year: u32) -> bool {
    href.contains(&format!("/{year}/")) && href.to_lowercase().ends_with(".pdf")
}

/// Parse `markup` and collect the resolved, deduplicated candidate URLs.
pub fn extract_candidates(
    markup: &str,
    parser: &dyn MarkupParser,
    year: u32,
    base_url: &Url,
) -> CandidateList {
    let mut candidates = CandidateList::new();

    let hrefs = parser
        .parse(markup)
        .into_iter()
        .filter(|record| record.tag == "a")
        .filter_map(|record| record.attr("href").map(str::to_owned));

    for href in hrefs {
        if !is_candidate_href(&href, year) {
            continue;
        }

        match base_url.join(&href) {
            Ok(resolved) => {
                if !candidates.push(resolved.to_string()) {
                    debug!(%href, "duplicate paper link");
                }
            }
            Err(e) => warn!(%href, error = %e, "could not resolve paper link, skipping"),
        }
    }

    candidates
}
