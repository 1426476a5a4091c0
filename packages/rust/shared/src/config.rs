//! Application configuration for seobatch.
//!
//! Resolution order: an explicit `--config` path, then `./seobatch.toml`,
//! then `~/.seobatch/seobatch.toml`, then built-in defaults.
//! CLI flags override config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeoBatchError};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "seobatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".seobatch";

// ---------------------------------------------------------------------------
// Config structs (matching seobatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// File and directory locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// URL list settings.
    #[serde(default)]
    pub input: InputConfig,

    /// External crawler settings.
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Workbook export settings.
    #[serde(default)]
    pub export: ExportConfig,
}

/// `[paths]` section. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// CSV or spreadsheet holding the URLs to crawl.
    #[serde(default = "default_urls_file")]
    pub urls_file: PathBuf,

    /// Folder the crawler writes its exports into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Folder for per-run log files and batch reports.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,

    /// Consolidated workbook destination.
    #[serde(default = "default_workbook")]
    pub workbook: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            urls_file: default_urls_file(),
            output_dir: default_output_dir(),
            logs_dir: default_logs_dir(),
            workbook: default_workbook(),
        }
    }
}

fn default_urls_file() -> PathBuf {
    "urls.csv".into()
}
fn default_output_dir() -> PathBuf {
    "output".into()
}
fn default_logs_dir() -> PathBuf {
    "logs".into()
}
fn default_workbook() -> PathBuf {
    "screamingfrog_output.xlsx".into()
}

/// `[input]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Header of the column holding the URLs.
    #[serde(default = "default_url_column")]
    pub url_column: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            url_column: default_url_column(),
        }
    }
}

fn default_url_column() -> String {
    "URL".into()
}

/// `[crawler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Path to the crawler's command line executable.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Tab/filter selection passed to `--export-tabs`.
    #[serde(default = "default_export_tabs")]
    pub export_tabs: String,

    /// Pass `--headless`.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Pass `--save-crawl`.
    #[serde(default = "default_true")]
    pub save_crawl: bool,

    /// Extra arguments appended after the fixed ones.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Kill a crawl that runs longer than this. Unset means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            export_tabs: default_export_tabs(),
            headless: true,
            save_crawl: true,
            extra_args: Vec::new(),
            timeout_secs: None,
        }
    }
}

fn default_executable() -> PathBuf {
    if cfg!(windows) {
        r"C:\Program Files\Screaming Frog SEO Spider\screamingfrogseospidercli.exe".into()
    } else if cfg!(target_os = "macos") {
        "/Applications/Screaming Frog SEO Spider.app/Contents/MacOS/ScreamingFrogSEOSpiderLauncher"
            .into()
    } else {
        "screamingfrogseospider".into()
    }
}
fn default_export_tabs() -> String {
    "Internal:All".into()
}
fn default_true() -> bool {
    true
}

/// `[export]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Extension (without dot) of the crawler exports to merge.
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
        }
    }
}

fn default_extension() -> String {
    "csv".into()
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Settings a single crawler invocation needs.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    pub executable: PathBuf,
    /// Absolute folder passed to `--output-folder`.
    pub output_dir: PathBuf,
    pub export_tabs: String,
    pub headless: bool,
    pub save_crawl: bool,
    pub extra_args: Vec<String>,
    pub timeout: Option<Duration>,
}

/// Runtime configuration for one batch run, with every path resolved.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub urls_file: PathBuf,
    pub url_column: String,
    pub logs_dir: PathBuf,
    pub workbook: PathBuf,
    pub export_extension: String,
    pub invoker: InvokerConfig,
}

impl RunConfig {
    /// Resolve relative paths in `config` against `workdir`.
    pub fn resolve(config: &AppConfig, workdir: &Path) -> Self {
        let at = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                workdir.join(p)
            }
        };

        Self {
            urls_file: at(&config.paths.urls_file),
            url_column: config.input.url_column.clone(),
            logs_dir: at(&config.paths.logs_dir),
            workbook: at(&config.paths.workbook),
            export_extension: config
                .export
                .extension
                .trim_start_matches('.')
                .to_string(),
            invoker: InvokerConfig {
                executable: config.crawler.executable.clone(),
                output_dir: at(&config.paths.output_dir),
                export_tabs: config.crawler.export_tabs.clone(),
                headless: config.crawler.headless,
                save_crawl: config.crawler.save_crawl,
                extra_args: config.crawler.extra_args.clone(),
                timeout: config
                    .crawler
                    .timeout_secs
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
            },
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.invoker.output_dir
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the user config directory (`~/.seobatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SeoBatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.seobatch/seobatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Find the config file to use: `workdir/seobatch.toml` wins over the user file.
pub fn discover_config(workdir: &Path) -> Result<Option<PathBuf>> {
    let local = workdir.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Ok(Some(local));
    }
    let user = config_file_path()?;
    Ok(user.is_file().then_some(user))
}

/// Load the application config. Returns defaults if no config file exists.
pub fn load_config(workdir: &Path) -> Result<AppConfig> {
    match discover_config(workdir)? {
        Some(path) => load_config_from(&path),
        None => {
            tracing::debug!(workdir = %workdir.display(), "no config file found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SeoBatchError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        SeoBatchError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject settings that would make every run fail in the same way.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.input.url_column.trim().is_empty() {
        return Err(SeoBatchError::config("input.url_column must not be empty"));
    }
    if config.crawler.executable.as_os_str().is_empty() {
        return Err(SeoBatchError::config("crawler.executable must not be empty"));
    }
    if config.crawler.export_tabs.trim().is_empty() {
        return Err(SeoBatchError::config("crawler.export_tabs must not be empty"));
    }
    if config.export.extension.trim_start_matches('.').is_empty() {
        return Err(SeoBatchError::config("export.extension must not be empty"));
    }
    Ok(())
}

/// Write a default config file into `dir`. Returns the path to the created file.
pub fn init_config(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| SeoBatchError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(SeoBatchError::config(format!(
            "{} already exists, refusing to overwrite",
            path.display()
        )));
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SeoBatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SeoBatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
