//! Child-process crawler invoker.

use std::ffi::OsString;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{error, info, instrument, warn};

use seobatch_shared::{CrawlOutcome, InvokerConfig, TargetAddress};

use crate::CrawlInvoker;

/// How long to wait for a killed crawl to be reaped before giving up on it.
const REAP_GRACE: Duration = Duration::from_secs(5);

/// Launches the configured crawler executable once per address.
#[derive(Debug, Clone)]
pub struct CliCrawler {
    config: InvokerConfig,
}

impl CliCrawler {
    pub fn new(config: InvokerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// The argument list passed after the executable, in order.
    pub fn crawl_args(&self, address: &TargetAddress) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--crawl".into(), address.as_str().into()];
        if self.config.headless {
            args.push("--headless".into());
        }
        args.push("--output-folder".into());
        args.push(self.config.output_dir.clone().into_os_string());
        args.push("--export-tabs".into());
        args.push(self.config.export_tabs.clone().into());
        if self.config.save_crawl {
            args.push("--save-crawl".into());
        }
        args.extend(self.config.extra_args.iter().map(OsString::from));
        args
    }

    #[instrument(skip_all, fields(url = %address))]
    async fn run(&self, address: &TargetAddress) -> CrawlOutcome {
        let exe = &self.config.executable;
        info!(url = %address, "starting crawl");

        let started = Instant::now();
        let mut command = Command::new(exe);
        command
            .args(self.crawl_args(address))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The launcher starts helpers of its own; a timeout must take them down too.
        #[cfg(unix)]
        command.process_group(0);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return self.spawn_failure(address, e),
        };
        let pid = child.id();

        let mut wait = std::pin::pin!(child.wait_with_output());
        let output = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait.as_mut()).await {
                Ok(output) => output,
                Err(_) => {
                    if kill_process_group(pid) {
                        // stderr reaches EOF only once every process in the group has exited.
                        if tokio::time::timeout(REAP_GRACE, wait.as_mut()).await.is_err() {
                            warn!(url = %address, "killed crawl did not exit in time");
                        }
                    }
                    warn!(url = %address, timeout_secs = limit.as_secs(), "crawl timed out, process killed");
                    return CrawlOutcome::TimedOut(limit);
                }
            },
            None => wait.await,
        };

        match output {
            Ok(output) if output.status.success() => {
                info!(
                    url = %address,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "crawl completed"
                );
                CrawlOutcome::Success
            }
            Ok(output) => {
                let detail = failure_detail(output.status, &output.stderr);
                error!(url = %address, %detail, "error crawling");
                CrawlOutcome::ProcessFailed(detail)
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                error!(url = %address, error = %e, "permission denied while waiting for crawler");
                CrawlOutcome::PermissionDenied
            }
            Err(e) => {
                error!(url = %address, error = %e, "unexpected error crawling");
                CrawlOutcome::UnexpectedError(e.to_string())
            }
        }
    }

    fn spawn_failure(&self, address: &TargetAddress, e: io::Error) -> CrawlOutcome {
        let exe = self.config.executable.display();
        match e.kind() {
            io::ErrorKind::NotFound => {
                error!(executable = %exe, "crawler executable not found, check the configured path");
                CrawlOutcome::ToolNotFound
            }
            io::ErrorKind::PermissionDenied => {
                error!(
                    executable = %exe,
                    url = %address,
                    "permission denied launching crawler, check file permissions"
                );
                CrawlOutcome::PermissionDenied
            }
            _ => {
                error!(executable = %exe, url = %address, error = %e, "unexpected error launching crawler");
                CrawlOutcome::UnexpectedError(e.to_string())
            }
        }
    }
}

impl CrawlInvoker for CliCrawler {
    async fn invoke(&self, address: &TargetAddress) -> CrawlOutcome {
        self.run(address).await
    }
}

/// SIGKILL the process group led by `pid`. Returns whether the signal was sent.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) -> bool {
    let Some(pgid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return false;
    };
    // SAFETY: killpg takes plain integers and touches no memory.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        tracing::debug!(pgid, error = %io::Error::last_os_error(), "could not signal crawl process group");
        return false;
    }
    true
}

/// Without process groups only the direct child is killed, when the wait future drops.
#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) -> bool {
    false
}

/// Exit code (or signal) plus the last non-empty stderr line, if any.
fn failure_detail(status: ExitStatus, stderr: &[u8]) -> String {
    let status = match status.code() {
        Some(code) => format!("exit code {code}"),
        None => status.to_string(),
    };
    let stderr = String::from_utf8_lossy(stderr);
    match stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
        Some(line) => format!("{status}: {line}"),
        None => status,
    }
}
