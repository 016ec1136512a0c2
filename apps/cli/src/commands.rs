//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use nimefetch_core::destination::DestinationStatus;
use nimefetch_core::pipeline::{ProgressReporter, fetch_papers};
use nimefetch_shared::{
    AppConfig, DownloadOutcome, ErrorKind, FetchConfig, NimeFetchError, RunSummary, init_config,
    load_config, load_config_from,
};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// nimefetch: download NIME proceedings PDFs for one year.
#[derive(Parser)]
#[command(
    name = "nimefetch",
    version,
    about = "Download every PDF paper of a NIME proceedings year into a local folder.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Defaults to `fetch` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch the papers index and download the target year's PDFs.
    Fetch(FetchArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for a fetch run. Unset flags fall back to the config file.
#[derive(Args, Debug, Default)]
pub(crate) struct FetchArgs {
    /// Proceedings year to download.
    #[arg(short, long)]
    pub year: Option<u32>,

    /// Base directory; `NIME_<year>_Papers` is created inside it.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Papers index page URL.
    #[arg(long)]
    pub papers_url: Option<String>,

    /// Base URL relative links are resolved against.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Read configuration from this file instead of ~/.nimefetch/nimefetch.toml.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show {
        /// Config file to show instead of the default location.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
///
/// Logs go to stderr; stdout carries the progress lines.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "nimefetch=warn",
        1 => "nimefetch=info",
        2 => "nimefetch=debug",
        _ => "nimefetch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => cmd_fetch(&FetchArgs::default()).await,
        Some(Command::Fetch(args)) => cmd_fetch(&args).await,
        Some(Command::Config { action }) => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show { config } => cmd_config_show(config.as_deref()),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_fetch(args: &FetchArgs) -> Result<()> {
    let mut app = read_config(args.config.as_deref())?;
    apply_overrides(&mut app, args)?;
    let config = FetchConfig::try_from(&app)?;

    info!(
        year = config.target_year,
        index = %config.papers_index_url,
        destination = %config.destination_dir().display(),
        "starting fetch"
    );

    let reporter = CliProgress::new(config.papers_index_url.as_str());

    let summary = match fetch_papers(&config, &reporter).await {
        Ok(summary) => summary,
        Err(e) => {
            reporter.abandon();
            return Err(explain_fatal(e, &config));
        }
    };

    print_summary(&summary);
    Ok(())
}

/// Attach an operator hint to a run-aborting error.
fn explain_fatal(err: NimeFetchError, config: &FetchConfig) -> color_eyre::Report {
    let hint = match err.kind() {
        ErrorKind::FatalSetup => format!(
            "could not prepare {}; check that '{}' exists and is writable",
            config.destination_dir().display(),
            config.base_save_path.display()
        ),
        ErrorKind::FatalFetch => format!(
            "could not fetch the papers index at {}",
            config.papers_index_url
        ),
        ErrorKind::PerFile => "download failed".to_string(),
    };
    color_eyre::Report::new(err).wrap_err(hint)
}

fn read_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Layer CLI flags over the file/default config.
fn apply_overrides(config: &mut AppConfig, args: &FetchArgs) -> Result<()> {
    if let Some(year) = args.year {
        config.target.year = year;
    }
    if let Some(out) = &args.out {
        config.target.save_path = out.to_string_lossy().into_owned();
    }
    if let Some(url) = &args.papers_url {
        Url::parse(url).map_err(|e| eyre!("invalid --papers-url '{url}': {e}"))?;
        config.source.papers_url = url.clone();
    }
    if let Some(url) = &args.base_url {
        Url::parse(url).map_err(|e| eyre!("invalid --base-url '{url}': {e}"))?;
        config.source.base_url = url.clone();
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    if summary.no_papers_found() {
        println!("  No {} papers were found on the index page.", summary.year);
        println!("  They are probably not published yet; run again once they are.");
        println!();
        return;
    }

    println!(
        "  All {} downloads finished. Files saved in: {}",
        summary.year,
        summary.destination.display()
    );
    println!("  Papers:     {}", summary.candidates);
    println!("  Downloaded: {}", summary.downloaded);
    println!("  Skipped:    {}", summary.skipped);
    println!("  Failed:     {}", summary.failures.len());
    for (filename, message) in &summary.failures {
        println!("    - {filename}: {message}");
    }
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter: a spinner while scanning, a bar while downloading.
struct CliProgress {
    bar: ProgressBar,
    index_url: String,
}

impl CliProgress {
    fn new(index_url: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self {
            bar,
            index_url: index_url.to_string(),
        }
    }

    fn abandon(&self) {
        self.bar.finish_and_clear();
    }

    /// Print a permanent line above the bar. Goes to stdout even when the bar is hidden.
    fn line(&self, text: String) {
        self.bar.suspend(|| println!("{text}"));
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        if name.starts_with("Fetching") {
            self.bar.set_message(format!("{name}: {}", self.index_url));
        } else {
            self.bar.set_message(name.to_string());
        }
    }

    fn destination_ready(&self, path: &Path, status: DestinationStatus) {
        let line = match status {
            DestinationStatus::Created => format!("Created folder: {}", path.display()),
            DestinationStatus::Existing => format!("Folder already exists: {}", path.display()),
        };
        self.line(line);
    }

    fn candidates_found(&self, year: u32, count: usize) {
        if count > 0 {
            self.line(format!("Found {count} papers from {year}. Starting downloads..."));
            self.bar.set_style(bar_style());
            self.bar.set_length(count as u64);
        }
    }

    fn file_started(&self, filename: &str, current: usize, total: usize) {
        self.line(started_line(filename, current, total));
        self.bar.set_message(format!("Downloading {filename}"));
    }

    fn file_finished(&self, outcome: &DownloadOutcome, current: usize, total: usize) {
        self.line(finished_line(outcome, current, total));
        self.bar.inc(1);
    }

    fn done(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}

fn started_line(filename: &str, current: usize, total: usize) -> String {
    format!("({current}/{total}) Downloading: {filename} ...")
}

/// Skips stand alone; results of a request follow its "Downloading" line.
fn finished_line(outcome: &DownloadOutcome, current: usize, total: usize) -> String {
    match outcome {
        DownloadOutcome::Skipped { filename } => {
            format!("({current}/{total}) Already exists, skipping: {filename}")
        }
        DownloadOutcome::Completed { filename, .. } => format!("  -> Downloaded: {filename}"),
        DownloadOutcome::Failed { filename, message } => {
            format!("  -> Failed: {filename}, error: {message}")
        }
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config().wrap_err("could not write default config")?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = read_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
