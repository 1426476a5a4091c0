//! Core pipeline orchestration for seobatch.
//!
//! This crate ties together URL list loading, the batch crawl driver, and
//! export consolidation into the end-to-end [`pipeline::run`] workflow.

pub mod aggregate;
pub mod batch;
pub mod loader;
pub mod pipeline;
pub mod workbook;

#[cfg(test)]
mod test_logs;

pub use aggregate::{AggregateReport, Table, export_workbook};
pub use batch::{crawl_all, run_batch};
pub use loader::load_addresses;
pub use pipeline::{ProgressReporter, RunResult, SilentProgress, run};
