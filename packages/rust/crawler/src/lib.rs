//! Crawl invocation: one external crawler process per target address.
//!
//! This crate provides:
//! - [`CrawlInvoker`] — the seam the batch driver calls, one address at a time
//! - [`CliCrawler`] — runs the crawler's command line executable as a child process

use std::future::Future;

use seobatch_shared::{CrawlOutcome, TargetAddress};

pub mod process;

pub use process::CliCrawler;

/// Runs one crawl for one address and reports how it went.
///
/// Implementations must not fail past this boundary: every problem is turned
/// into a [`CrawlOutcome`] so the caller can move on to the next address.
pub trait CrawlInvoker: Send + Sync {
    fn invoke(&self, address: &TargetAddress) -> impl Future<Output = CrawlOutcome> + Send;
}
