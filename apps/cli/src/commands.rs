//! CLI command definitions, routing, and tracing setup.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use seobatch_core::pipeline::{ProgressReporter, RunResult};
use seobatch_crawler::CliCrawler;
use seobatch_shared::{
    AppConfig, CrawlOutcome, RunConfig, TargetAddress, config_dir, init_config, load_config,
    load_config_from, validate_config,
};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// seobatch — crawl a list of sites and merge the exports into one workbook.
#[derive(Parser)]
#[command(
    name = "seobatch",
    version,
    about = "Run the SEO crawler over a list of URLs and consolidate its exports into one workbook.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of the discovered one.
    #[arg(long = "config", env = "SEOBATCH_CONFIG", global = true)]
    pub config_file: Option<PathBuf>,

    /// Directory relative paths are resolved against (defaults to the current directory).
    #[arg(long, global = true)]
    pub workdir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
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
    /// Crawl every URL in the list, then build the workbook.
    Run(RunArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for `seobatch run`. Unset flags fall back to the config file.
#[derive(Args, Default)]
pub(crate) struct RunArgs {
    /// CSV or spreadsheet with the URLs to crawl.
    #[arg(long)]
    pub urls: Option<PathBuf>,

    /// Header of the column holding the URLs.
    #[arg(long)]
    pub url_column: Option<String>,

    /// Folder the crawler writes its exports into.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Destination of the consolidated workbook.
    #[arg(long)]
    pub workbook: Option<PathBuf>,

    /// Path to the crawler's command line executable.
    #[arg(long, env = "SEOBATCH_CRAWLER")]
    pub crawler: Option<PathBuf>,

    /// Tabs to export from each crawl.
    #[arg(long)]
    pub export_tabs: Option<String>,

    /// Kill a crawl after this many seconds (0 disables the limit).
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(urls) = &self.urls {
            config.paths.urls_file = urls.clone();
        }
        if let Some(column) = &self.url_column {
            config.input.url_column = column.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.paths.output_dir = dir.clone();
        }
        if let Some(workbook) = &self.workbook {
            config.paths.workbook = workbook.clone();
        }
        if let Some(crawler) = &self.crawler {
            config.crawler.executable = crawler.clone();
        }
        if let Some(tabs) = &self.export_tabs {
            config.crawler.export_tabs = tabs.clone();
        }
        if let Some(timeout) = self.timeout {
            config.crawler.timeout_secs = Some(timeout);
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default config file into the working directory.
    Init {
        /// Write to ~/.seobatch instead.
        #[arg(long)]
        user: bool,
    },
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing: console output per CLI flags, plus the run log file if given.
pub(crate) fn init_tracing(cli: &Cli, log_file: Option<File>) {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "seobatch=info",
        1 => "seobatch=debug",
        _ => "seobatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let console = match cli.log_format {
        LogFormat::Text => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    let file = log_file.map(|f| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Arc::new(f))
            .with_filter(LevelFilter::INFO)
    });

    tracing_subscriber::registry()
        .with(console.with_filter(env_filter))
        .with(file)
        .init();
}

/// Open `<logs_dir>/log_<stamp>.log` for appending.
fn open_log_file(logs_dir: &Path, stamp: &str) -> Result<File> {
    std::fs::create_dir_all(logs_dir)
        .wrap_err_with(|| format!("cannot create logs folder {}", logs_dir.display()))?;
    let path = logs_dir.join(format!("log_{stamp}.log"));
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .wrap_err_with(|| format!("cannot open log file {}", path.display()))
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let workdir = match &cli.workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| eyre!("cannot determine working directory: {e}"))?,
    };

    match &cli.command {
        Command::Run(args) => {
            let mut config = resolve_config(&cli, &workdir)?;
            args.apply(&mut config);
            validate_config(&config)?;
            let run_config = RunConfig::resolve(&config, &workdir);

            let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
            let log_file = open_log_file(&run_config.logs_dir, &stamp)?;
            init_tracing(&cli, Some(log_file));

            cmd_run(&run_config, &stamp).await
        }
        Command::Config { action } => {
            init_tracing(&cli, None);
            match action {
                ConfigAction::Init { user } => cmd_config_init(&workdir, *user),
                ConfigAction::Show => cmd_config_show(&cli, &workdir),
            }
        }
    }
}

fn resolve_config(cli: &Cli, workdir: &Path) -> Result<AppConfig> {
    let config = match &cli.config_file {
        Some(path) => load_config_from(path)?,
        None => load_config(workdir)?,
    };
    Ok(config)
}

async fn cmd_run(config: &RunConfig, stamp: &str) -> Result<()> {
    info!(
        urls_file = %config.urls_file.display(),
        output_dir = %config.output_dir().display(),
        crawler = %config.invoker.executable.display(),
        "starting run"
    );

    if config.invoker.timeout.is_none() {
        info!("no crawl timeout configured, a hung crawler will block the batch");
    }

    let crawler = CliCrawler::new(config.invoker.clone());
    let reporter = CliProgress::new();
    let result = seobatch_core::run(config, &crawler, &reporter).await?;

    write_report(&config.logs_dir, stamp, &result);
    print_summary(config, &result);

    match result.structural_failure() {
        Some(reason) => Err(eyre!(reason)),
        None => Ok(()),
    }
}

/// Save the run result as JSON next to the log file. Failure only warns.
fn write_report(logs_dir: &Path, stamp: &str, result: &RunResult) {
    let path = logs_dir.join(format!("batch_report_{stamp}.json"));
    let written = serde_json::to_string_pretty(result)
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
    match written {
        Ok(()) => info!(path = %path.display(), "batch report written"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not write batch report"),
    }
}

fn print_summary(config: &RunConfig, result: &RunResult) {
    println!();
    println!("  Batch finished.");
    println!("  Crawled:   {}", result.batch.entries.len());
    println!("  Succeeded: {}", result.batch.succeeded());
    println!("  Failed:    {}", result.batch.failed());
    match result.export.as_ref().and_then(|e| e.workbook.as_ref().map(|w| (w, e.sheets.len()))) {
        Some((path, sheets)) => println!("  Workbook:  {} ({sheets} sheets)", path.display()),
        None => println!("  Workbook:  not written"),
    }
    println!("  Logs:      {}", config.logs_dir.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn crawl_started(&self, address: &TargetAddress, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Crawling [{current}/{total}] {address}"));
    }

    fn crawl_finished(&self, address: &TargetAddress, outcome: &CrawlOutcome) {
        if !outcome.is_success() {
            self.spinner.println(format!("  ✗ {address}: {outcome}"));
        }
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}

fn cmd_config_init(workdir: &Path, user: bool) -> Result<()> {
    let dir = if user { config_dir()? } else { workdir.to_path_buf() };
    let path = init_config(&dir)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli, workdir: &Path) -> Result<()> {
    let config = resolve_config(cli, workdir)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
