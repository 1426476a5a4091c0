//! End-to-end `run` pipeline: URL list → crawl each URL → merge exports → workbook.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, instrument};

use seobatch_crawler::CrawlInvoker;
use seobatch_shared::{BatchReport, CrawlOutcome, Result, RunConfig, SeoBatchError, TargetAddress};

use crate::aggregate::{AggregateReport, export_workbook};
use crate::batch::crawl_all;

/// Result of one full run.
#[derive(Debug, Serialize)]
pub struct RunResult {
    pub batch: BatchReport,
    /// Present when the export step ran to completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<AggregateReport>,
    /// Why the export step failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_error: Option<String>,
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
}

impl RunResult {
    /// Why the run failed as a whole: the batch never started or the workbook
    /// could not be written. Individual crawl failures do not count.
    pub fn structural_failure(&self) -> Option<String> {
        if let Some(reason) = &self.batch.aborted {
            return Some(format!("batch aborted: {reason}"));
        }
        self.export_error
            .as_ref()
            .map(|reason| format!("workbook export failed: {reason}"))
    }

    pub fn has_structural_failure(&self) -> bool {
        self.structural_failure().is_some()
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each crawl starts.
    fn crawl_started(&self, address: &TargetAddress, current: usize, total: usize);
    /// Called after each crawl returns.
    fn crawl_finished(&self, address: &TargetAddress, outcome: &CrawlOutcome);
    /// Called when the pipeline completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn crawl_started(&self, _address: &TargetAddress, _current: usize, _total: usize) {}
    fn crawl_finished(&self, _address: &TargetAddress, _outcome: &CrawlOutcome) {}
    fn done(&self, _result: &RunResult) {}
}

/// Run the full pipeline.
///
/// 1. Make sure the output folder exists
/// 2. Crawl every URL in the list (see [`crawl_all`])
/// 3. Merge the exports in the output folder into the workbook
///
/// The export step runs even when the crawl phase aborted, so exports left
/// by earlier runs are still consolidated.
#[instrument(skip_all, fields(urls_file = %config.urls_file.display()))]
pub async fn run<I: CrawlInvoker>(
    config: &RunConfig,
    invoker: &I,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();

    let output_dir = config.output_dir();
    std::fs::create_dir_all(output_dir).map_err(|e| SeoBatchError::io(output_dir, e))?;

    progress.phase("Crawling");
    let batch = crawl_all(config, invoker, progress).await;

    progress.phase("Exporting workbook");
    let (export, export_error) =
        match export_workbook(output_dir, &config.export_extension, &config.workbook) {
            Ok(report) => (Some(report), None),
            Err(e) => {
                error!(error = %e, "workbook export failed");
                (None, Some(e.to_string()))
            }
        };

    let result = RunResult {
        batch,
        export,
        export_error,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        succeeded = result.batch.succeeded(),
        failed = result.batch.failed(),
        sheets = result.export.as_ref().map_or(0, |e| e.sheets.len()),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "run complete"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use calamine::{Reader, Xlsx, open_workbook};
    use seobatch_shared::AppConfig;

    use super::*;

    /// Stands in for the crawler: drops one export per address into the output folder.
    struct ExportingInvoker {
        output_dir: PathBuf,
        calls: Mutex<usize>,
    }

    impl ExportingInvoker {
        fn new(config: &RunConfig) -> Self {
            Self {
                output_dir: config.output_dir().to_path_buf(),
                calls: Mutex::new(0),
            }
        }
    }

    impl CrawlInvoker for ExportingInvoker {
        async fn invoke(&self, address: &TargetAddress) -> CrawlOutcome {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if address.as_str().contains("broken") {
                return CrawlOutcome::ProcessFailed("exit code 1".into());
            }
            let body = format!("Address,Status Code\n{address},200\n");
            std::fs::write(self.output_dir.join(format!("internal_all_{n}.csv")), body).unwrap();
            CrawlOutcome::Success
        }
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("seobatch-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sheet_names(path: &Path) -> Vec<String> {
        let workbook: Xlsx<_> = open_workbook(path).unwrap();
        workbook.sheet_names()
    }

    #[tokio::test]
    async fn full_run_builds_workbook() {
        let dir = temp_dir();
        std::fs::write(
            dir.join("urls.csv"),
            "URL\nhttps://a.example\nhttps://broken.example\nhttps://c.example\n",
        )
        .unwrap();
        let config = RunConfig::resolve(&AppConfig::default(), &dir);
        let invoker = ExportingInvoker::new(&config);

        let result = run(&config, &invoker, &SilentProgress).await.unwrap();

        assert_eq!(*invoker.calls.lock().unwrap(), 3);
        assert_eq!(result.batch.succeeded(), 2);
        assert_eq!(result.batch.failed(), 1);
        assert!(!result.has_structural_failure());
        assert_eq!(
            sheet_names(&config.workbook),
            vec!["internal_all_1", "internal_all_3"]
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn rerun_replaces_workbook() {
        let dir = temp_dir();
        std::fs::write(dir.join("urls.csv"), "URL\nhttps://a.example\nhttps://b.example\n").unwrap();
        let config = RunConfig::resolve(&AppConfig::default(), &dir);

        run(&config, &ExportingInvoker::new(&config), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(sheet_names(&config.workbook).len(), 2);

        // Second run crawls a single URL into a clean output folder.
        std::fs::remove_dir_all(config.output_dir()).unwrap();
        std::fs::write(dir.join("urls.csv"), "URL\nhttps://z.example\n").unwrap();
        run(&config, &ExportingInvoker::new(&config), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(sheet_names(&config.workbook), vec!["internal_all_1"]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn aborted_batch_still_exports_and_flags_failure() {
        let dir = temp_dir();
        let config = RunConfig::resolve(&AppConfig::default(), &dir);
        std::fs::create_dir_all(config.output_dir()).unwrap();
        std::fs::write(
            config.output_dir().join("leftover.csv"),
            "Address\nhttps://old.example\n",
        )
        .unwrap();
        let invoker = ExportingInvoker::new(&config);

        let result = run(&config, &invoker, &SilentProgress).await.unwrap();

        assert_eq!(*invoker.calls.lock().unwrap(), 0);
        assert!(result.batch.is_aborted());
        assert!(result.has_structural_failure());
        assert!(
            result
                .structural_failure()
                .unwrap()
                .starts_with("batch aborted: input file not found")
        );
        assert_eq!(sheet_names(&config.workbook), vec!["leftover"]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn empty_run_writes_nothing() {
        let dir = temp_dir();
        std::fs::write(dir.join("urls.csv"), "URL\n").unwrap();
        let config = RunConfig::resolve(&AppConfig::default(), &dir);

        let result = run(&config, &ExportingInvoker::new(&config), &SilentProgress)
            .await
            .unwrap();

        assert!(result.batch.entries.is_empty());
        assert!(result.export.as_ref().unwrap().workbook.is_none());
        assert!(!config.workbook.exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn run_result_serializes() {
        let result = RunResult {
            batch: BatchReport::aborted("input file not found: urls.csv"),
            export: Some(AggregateReport::default()),
            export_error: None,
            elapsed: Duration::from_millis(1234),
        };
        assert!(result.structural_failure().unwrap().starts_with("batch aborted"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["elapsed"], 1234);
        assert_eq!(json["batch"]["aborted"], "input file not found: urls.csv");
    }

    #[test]
    fn export_error_is_a_structural_failure() {
        let result = RunResult {
            batch: BatchReport::new(&[]),
            export: None,
            export_error: Some("workbook error: disk full".into()),
            elapsed: Duration::ZERO,
        };
        assert_eq!(
            result.structural_failure().as_deref(),
            Some("workbook export failed: workbook error: disk full")
        );

        let clean = RunResult {
            export_error: None,
            export: Some(AggregateReport::default()),
            ..result
        };
        assert!(!clean.has_structural_failure());
    }
}
