//! Core domain types for a batch crawl run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TargetAddress
// ---------------------------------------------------------------------------

/// A single URL to hand to the crawler. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetAddress(String);

impl TargetAddress {
    /// Trim the raw cell value; returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TargetAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// CrawlOutcome
// ---------------------------------------------------------------------------

/// Result of one crawler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CrawlOutcome {
    Success,
    /// The configured crawler executable does not exist.
    ToolNotFound,
    /// The crawler ran but exited unsuccessfully.
    ProcessFailed(String),
    /// The OS refused to run the crawler or touch its files.
    PermissionDenied,
    /// The crawler exceeded the configured time limit and was killed.
    TimedOut(#[serde(with = "duration_secs")] Duration),
    UnexpectedError(String),
}

impl CrawlOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Short, stable label used in logs and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ToolNotFound => "tool_not_found",
            Self::ProcessFailed(_) => "process_failed",
            Self::PermissionDenied => "permission_denied",
            Self::TimedOut(_) => "timed_out",
            Self::UnexpectedError(_) => "unexpected_error",
        }
    }
}

impl std::fmt::Display for CrawlOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::ToolNotFound => f.write_str("crawler executable not found"),
            Self::ProcessFailed(detail) => write!(f, "crawler failed: {detail}"),
            Self::PermissionDenied => f.write_str("permission denied"),
            Self::TimedOut(after) => write!(f, "timed out after {}s", after.as_secs()),
            Self::UnexpectedError(detail) => write!(f, "unexpected error: {detail}"),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

// ---------------------------------------------------------------------------
// BatchReport
// ---------------------------------------------------------------------------

/// Progress of one address within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Finished {
        outcome: CrawlOutcome,
        elapsed_ms: u64,
    },
}

/// One address and where it stands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub address: TargetAddress,
    pub status: EntryStatus,
}

/// Everything that happened during one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Time-sortable run identifier.
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Entries in input order.
    pub entries: Vec<BatchEntry>,
    /// Set when a structural error stopped the batch before any crawl ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl BatchReport {
    /// Start a report with every address pending.
    pub fn new(addresses: &[TargetAddress]) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            finished_at: None,
            entries: addresses
                .iter()
                .map(|address| BatchEntry {
                    address: address.clone(),
                    status: EntryStatus::Pending,
                })
                .collect(),
            aborted: None,
        }
    }

    /// A report for a batch that never got to crawl anything.
    pub fn aborted(reason: impl Into<String>) -> Self {
        let mut report = Self::new(&[]);
        report.aborted = Some(reason.into());
        report.finished_at = Some(Utc::now());
        report
    }

    /// Record the outcome for the entry at `index`.
    pub fn finish_entry(&mut self, index: usize, outcome: CrawlOutcome, elapsed: Duration) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.status = EntryStatus::Finished {
                outcome,
                elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            };
        }
    }

    /// Iterate over outcomes of finished entries, in input order.
    pub fn outcomes(&self) -> impl Iterator<Item = &CrawlOutcome> {
        self.entries.iter().filter_map(|e| match &e.status {
            EntryStatus::Finished { outcome, .. } => Some(outcome),
            EntryStatus::Pending => None,
        })
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes().filter(|o| !o.is_success()).count()
    }

    pub fn pending(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .count()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}
