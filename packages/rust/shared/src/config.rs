//! Application configuration for nimefetch.
//!
//! User config lives at `~/.nimefetch/nimefetch.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{NimeFetchError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "nimefetch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".nimefetch";

/// Default proceedings index page.
pub const DEFAULT_PAPERS_URL: &str = "https://nime.org/papers/";

/// Default base URL relative hrefs are resolved against.
pub const DEFAULT_BASE_URL: &str = "https://nime.org/";

// ---------------------------------------------------------------------------
// Config structs (matching nimefetch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which year to fetch and where to put it.
    #[serde(default)]
    pub target: TargetConfig,

    /// Where the papers come from.
    #[serde(default)]
    pub source: SourceConfig,
}

/// `[target]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Proceedings year to download.
    #[serde(default = "default_year")]
    pub year: u32,

    /// Base directory; the per-year folder is created inside it.
    #[serde(default = "default_save_path")]
    pub save_path: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            year: default_year(),
            save_path: default_save_path(),
        }
    }
}

fn default_year() -> u32 {
    2025
}
fn default_save_path() -> String {
    ".".into()
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Index page listing the papers.
    #[serde(default = "default_papers_url")]
    pub papers_url: String,

    /// Site root used to resolve relative links.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for the index page request.
    #[serde(default = "default_index_timeout")]
    pub index_timeout_secs: u64,

    /// Timeout for each paper download.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            papers_url: default_papers_url(),
            base_url: default_base_url(),
            index_timeout_secs: default_index_timeout(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

fn default_papers_url() -> String {
    DEFAULT_PAPERS_URL.into()
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn default_index_timeout() -> u64 {
    30
}
fn default_download_timeout() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for one run. Immutable once built.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Proceedings year; links must contain `/{target_year}/`.
    pub target_year: u32,
    /// Directory the per-year folder is created in.
    pub base_save_path: PathBuf,
    /// Index page to scan for links.
    pub papers_index_url: Url,
    /// Base for resolving relative hrefs.
    pub site_base_url: Url,
    /// Timeout for the index page request.
    pub index_timeout: Duration,
    /// Timeout for each paper download.
    pub download_timeout: Duration,
}

impl FetchConfig {
    /// `base_save_path / NIME_{year}_Papers`.
    pub fn destination_dir(&self) -> PathBuf {
        self.base_save_path
            .join(format!("NIME_{}_Papers", self.target_year))
    }
}

impl TryFrom<&AppConfig> for FetchConfig {
    type Error = NimeFetchError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let papers_index_url = parse_url("source.papers_url", &config.source.papers_url)?;
        let site_base_url = parse_url("source.base_url", &config.source.base_url)?;

        Ok(Self {
            target_year: config.target.year,
            base_save_path: PathBuf::from(&config.target.save_path),
            papers_index_url,
            site_base_url,
            index_timeout: Duration::from_secs(config.source.index_timeout_secs),
            download_timeout: Duration::from_secs(config.source.download_timeout_secs),
        })
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| NimeFetchError::config(format!("invalid {field} '{value}': {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.nimefetch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NimeFetchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.nimefetch/nimefetch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NimeFetchError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        NimeFetchError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NimeFetchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| NimeFetchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NimeFetchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
