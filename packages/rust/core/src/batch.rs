//! Batch driver: one crawl per address, in order, never stopping early.

use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use seobatch_crawler::CrawlInvoker;
use seobatch_shared::{BatchReport, RunConfig, TargetAddress};

use crate::loader::load_addresses;
use crate::pipeline::ProgressReporter;

/// Crawl every address in input order, waiting for each crawl to finish.
///
/// Individual failures are recorded in the report and never stop the batch.
#[instrument(skip_all, fields(total = addresses.len()))]
pub async fn run_batch<I: CrawlInvoker>(
    addresses: &[TargetAddress],
    invoker: &I,
    progress: &dyn ProgressReporter,
) -> BatchReport {
    info!("starting batch crawl");
    let report = drive(addresses, invoker, progress).await;
    log_completion(&report);
    report
}

/// Load the URL list named by `config` and crawl it.
///
/// Structural problems with the input (missing file, missing column) are
/// logged once and produce an aborted report with zero crawls.
#[instrument(skip_all, fields(urls_file = %config.urls_file.display()))]
pub async fn crawl_all<I: CrawlInvoker>(
    config: &RunConfig,
    invoker: &I,
    progress: &dyn ProgressReporter,
) -> BatchReport {
    info!("starting batch crawl");

    let report = match load_addresses(&config.urls_file, &config.url_column) {
        Ok(addresses) => drive(&addresses, invoker, progress).await,
        Err(e) => {
            error!(error = %e, "cannot read URL list, no crawls started");
            BatchReport::aborted(e.to_string())
        }
    };

    log_completion(&report);
    report
}

async fn drive<I: CrawlInvoker>(
    addresses: &[TargetAddress],
    invoker: &I,
    progress: &dyn ProgressReporter,
) -> BatchReport {
    let mut report = BatchReport::new(addresses);
    let total = addresses.len();

    if total == 0 {
        warn!("no URLs to crawl, skipping crawl phase");
    }

    for (i, address) in addresses.iter().enumerate() {
        progress.crawl_started(address, i + 1, total);
        let started = Instant::now();
        let outcome = invoker.invoke(address).await;
        progress.crawl_finished(address, &outcome);
        report.finish_entry(i, outcome, started.elapsed());
    }

    report.finished_at = Some(Utc::now());
    report
}

fn log_completion(report: &BatchReport) {
    info!(
        run_id = %report.run_id,
        succeeded = report.succeeded(),
        failed = report.failed(),
        aborted = report.is_aborted(),
        "batch crawl completed"
    );
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use seobatch_shared::{AppConfig, CrawlOutcome, EntryStatus};

    use super::*;
    use crate::pipeline::SilentProgress;
    use crate::test_logs::CapturedLogs;

    /// Records every address it is asked to crawl; fails the listed ones.
    #[derive(Default)]
    struct FakeInvoker {
        calls: Mutex<Vec<String>>,
        failing: HashSet<String>,
    }

    impl FakeInvoker {
        fn failing(urls: &[&str]) -> Self {
            Self {
                calls: Mutex::default(),
                failing: urls.iter().map(|u| u.to_string()).collect(),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CrawlInvoker for FakeInvoker {
        async fn invoke(&self, address: &TargetAddress) -> CrawlOutcome {
            self.calls.lock().unwrap().push(address.to_string());
            if self.failing.contains(address.as_str()) {
                CrawlOutcome::ProcessFailed("exit code 1".into())
            } else {
                CrawlOutcome::Success
            }
        }
    }

    fn addrs(urls: &[&str]) -> Vec<TargetAddress> {
        urls.iter().map(|u| TargetAddress::parse(u).unwrap()).collect()
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("seobatch-batch-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn invokes_once_per_address_in_order() {
        let urls = ["https://a.example", "https://b.example", "https://a.example"];
        let invoker = FakeInvoker::default();
        let (logs, _guard) = CapturedLogs::install();

        let report = run_batch(&addrs(&urls), &invoker, &SilentProgress).await;

        assert!(logs.has("INFO", "starting batch crawl"));
        assert!(logs.has("INFO", "batch crawl completed"));
        assert_eq!(invoker.calls(), urls);
        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.pending(), 0);
        assert!(report.finished_at.is_some());
    }

    #[tokio::test]
    async fn failure_does_not_short_circuit() {
        let urls = ["https://a.example", "https://broken.example", "https://c.example"];
        let invoker = FakeInvoker::failing(&["https://broken.example"]);
        let (logs, _guard) = CapturedLogs::install();

        let report = run_batch(&addrs(&urls), &invoker, &SilentProgress).await;

        assert!(logs.has("batch crawl completed", "succeeded=2"));
        assert!(logs.has("batch crawl completed", "failed=1"));
        assert_eq!(invoker.calls(), urls);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        match &report.entries[1].status {
            EntryStatus::Finished { outcome, .. } => {
                assert_eq!(outcome.label(), "process_failed");
            }
            EntryStatus::Pending => panic!("entry left pending"),
        }
    }

    #[tokio::test]
    async fn empty_list_performs_no_invocations() {
        let invoker = FakeInvoker::default();
        let (logs, _guard) = CapturedLogs::install();

        let report = run_batch(&[], &invoker, &SilentProgress).await;

        assert!(logs.has("WARN", "no URLs to crawl"));
        assert!(logs.has("INFO", "batch crawl completed"));
        assert!(invoker.calls().is_empty());
        assert!(report.entries.is_empty());
        assert!(!report.is_aborted());
    }

    #[tokio::test]
    async fn schema_error_aborts_before_any_crawl() {
        let dir = temp_dir();
        std::fs::write(dir.join("urls.csv"), "Website\nhttps://a.example\n").unwrap();
        let config = RunConfig::resolve(&AppConfig::default(), &dir);
        let invoker = FakeInvoker::default();
        let (logs, _guard) = CapturedLogs::install();

        let report = crawl_all(&config, &invoker, &SilentProgress).await;

        assert!(logs.has("ERROR", "cannot read URL list"));
        assert!(logs.has("INFO", "starting batch crawl"));
        assert!(logs.has("INFO", "batch crawl completed"));
        assert!(invoker.calls().is_empty());
        assert!(report.is_aborted());
        assert!(report.aborted.as_deref().unwrap().contains("schema error"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_input_aborts_before_any_crawl() {
        let dir = temp_dir();
        let config = RunConfig::resolve(&AppConfig::default(), &dir);
        let invoker = FakeInvoker::default();

        let report = crawl_all(&config, &invoker, &SilentProgress).await;

        assert!(invoker.calls().is_empty());
        assert!(report.aborted.as_deref().unwrap().contains("not found"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn crawl_all_reads_list_and_crawls() {
        let dir = temp_dir();
        std::fs::write(
            dir.join("urls.csv"),
            "URL\nhttps://a.example\n\nhttps://b.example\n",
        )
        .unwrap();
        let config = RunConfig::resolve(&AppConfig::default(), &dir);
        let invoker = FakeInvoker::default();

        let report = crawl_all(&config, &invoker, &SilentProgress).await;

        assert_eq!(invoker.calls(), ["https://a.example", "https://b.example"]);
        assert_eq!(report.succeeded(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}
