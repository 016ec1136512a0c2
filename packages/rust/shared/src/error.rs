//! Error types for nimefetch.
//!
//! Library crates use [`NimeFetchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// How the pipeline must react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The destination could not be prepared (or config is unusable). Run aborts.
    FatalSetup,
    /// The index page could not be fetched. Run aborts.
    FatalFetch,
    /// A single paper failed. The run continues with the next candidate.
    PerFile,
}

impl ErrorKind {
    /// Whether this kind stops the whole run.
    pub fn is_fatal(self) -> bool {
        !matches!(self, Self::PerFile)
    }
}

/// Top-level error type for all nimefetch operations.
#[derive(Debug, thiserror::Error)]
pub enum NimeFetchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The destination directory could not be created.
    #[error("cannot create destination directory {path:?}: {source}")]
    Setup {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Network/HTTP error while fetching the index page.
    #[error("index fetch failed: {0}")]
    Fetch(String),

    /// Failure downloading or writing a single paper.
    #[error("download of {file} failed: {message}")]
    Download { file: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NimeFetchError>;

/// Render `err` followed by every `source()` below it, joined with `": "`.
///
/// HTTP client errors keep the actual cause (refused connection, DNS
/// failure, reset) in their source chain rather than in their own message.
/// Causes already spelled out by an outer message are not repeated.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}

impl NimeFetchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a directory creation failure with the offending path.
    pub fn setup(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Setup {
            path: path.into(),
            source,
        }
    }

    /// Create an index fetch error from any displayable message.
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a per-file download error.
    pub fn download(file: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Download {
            file: file.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error for abort-vs-continue decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } | Self::Setup { .. } | Self::Io { .. } => ErrorKind::FatalSetup,
            Self::Fetch(_) => ErrorKind::FatalFetch,
            Self::Download { .. } => ErrorKind::PerFile,
        }
    }
}
