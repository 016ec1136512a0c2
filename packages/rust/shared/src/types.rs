//! Core domain types for a fetch run.

use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// CandidateList
// ---------------------------------------------------------------------------

/// Absolute paper URLs in order of first appearance, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    urls: Vec<String>,
}

impl CandidateList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `url` unless an identical string is already present.
    /// Returns `true` if it was added.
    pub fn push(&mut self, url: String) -> bool {
        // Linear scan; index pages hold at most a few hundred links.
        if self.urls.contains(&url) {
            return false;
        }
        self.urls.push(url);
        true
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// DownloadOutcome
// ---------------------------------------------------------------------------

/// Terminal state of a single candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A file with the same name was already present; nothing fetched.
    Skipped { filename: String },
    /// Body written in full.
    Completed { filename: String, bytes: u64 },
    /// Request or write failed; any partial file was removed.
    Failed { filename: String, message: String },
}

impl DownloadOutcome {
    pub fn filename(&self) -> &str {
        match self {
            Self::Skipped { filename }
            | Self::Completed { filename, .. }
            | Self::Failed { filename, .. } => filename,
        }
    }
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

/// What a finished run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Per-year folder the papers were written to.
    pub destination: PathBuf,
    /// Target year.
    pub year: u32,
    /// Number of candidates after filtering and dedup.
    pub candidates: usize,
    /// Files fetched in this run.
    pub downloaded: usize,
    /// Files already on disk.
    pub skipped: usize,
    /// Failed files (filename, error message).
    pub failures: Vec<(String, String)>,
    /// Total bytes written in this run.
    pub bytes_written: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Fold one per-file outcome into the totals.
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Skipped { .. } => self.skipped += 1,
            DownloadOutcome::Completed { bytes, .. } => {
                self.downloaded += 1;
                self.bytes_written += bytes;
            }
            DownloadOutcome::Failed { filename, message } => {
                self.failures.push((filename.clone(), message.clone()));
            }
        }
    }

    /// True when the index held no matching papers.
    pub fn no_papers_found(&self) -> bool {
        self.candidates == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_list_dedups_in_order() {
        let mut list = CandidateList::new();
        assert!(list.push("https://nime.org/2025/a.pdf".into()));
        assert!(list.push("https://nime.org/2025/b.pdf".into()));
        assert!(!list.push("https://nime.org/2025/a.pdf".into()));

        let urls: Vec<&str> = list.iter().collect();
        assert_eq!(urls, ["https://nime.org/2025/a.pdf", "https://nime.org/2025/b.pdf"]);
    }

    #[test]
    fn summary_records_outcomes() {
        let mut summary = RunSummary::default();
        summary.record(&DownloadOutcome::Skipped {
            filename: "a.pdf".into(),
        });
        summary.record(&DownloadOutcome::Completed {
            filename: "b.pdf".into(),
            bytes: 1024,
        });
        summary.record(&DownloadOutcome::Failed {
            filename: "c.pdf".into(),
            message: "HTTP 500".into(),
        });

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.bytes_written, 1024);
        assert_eq!(summary.failures, vec![("c.pdf".to_string(), "HTTP 500".to_string())]);
    }
}
