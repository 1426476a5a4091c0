//! Output aggregation: crawler exports on disk → one workbook.
//!
//! Runs in three steps so the naming and filtering rules can be tested
//! without a filesystem:
//! 1. [`collect_tables`] reads every candidate export into memory,
//! 2. [`plan_sheets`] drops empty tables and assigns unique sheet names,
//! 3. [`write_workbook`](crate::workbook::write_workbook) writes the result.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use seobatch_shared::{Result, SeoBatchError};

use crate::workbook::write_workbook;

/// Longest sheet name the workbook format accepts.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Data rows that fit in one worksheet below the header row.
pub const MAX_DATA_ROWS: usize = 1_048_575;

/// Columns a worksheet can hold.
pub const MAX_COLUMNS: usize = 16_384;

/// Characters a sheet name may not contain.
static ILLEGAL_SHEET_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\]:*?/\\]").expect("valid regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A parsed export: header row plus data rows, all as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// A table is empty when it has no data rows, whatever its header.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An export file that parsed successfully.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub source: PathBuf,
    pub table: Table,
}

/// An export file that did not make it into the workbook, and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub file: PathBuf,
    pub reason: String,
}

/// Everything found in the output directory.
#[derive(Debug, Default)]
pub struct Collected {
    pub tables: Vec<LoadedTable>,
    pub skipped: Vec<SkippedFile>,
}

/// A table with its final sheet name.
#[derive(Debug, Clone)]
pub struct PlannedSheet {
    pub name: String,
    pub source: PathBuf,
    pub table: Table,
}

/// One sheet written to the workbook.
#[derive(Debug, Clone, Serialize)]
pub struct SheetSummary {
    pub sheet: String,
    pub source: PathBuf,
    pub rows: usize,
}

/// Outcome of the export step.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateReport {
    /// Where the workbook was written; `None` when there was nothing to export.
    pub workbook: Option<PathBuf>,
    pub sheets: Vec<SheetSummary>,
    pub skipped: Vec<SkippedFile>,
}

// ---------------------------------------------------------------------------
// Export entry point
// ---------------------------------------------------------------------------

/// Merge every non-empty `*.<extension>` file in `dir` into a workbook at `dest`.
///
/// Unreadable or empty exports are skipped. When nothing qualifies no
/// workbook is written. An existing workbook at `dest` is replaced.
#[instrument(skip_all, fields(dir = %dir.display(), dest = %dest.display()))]
pub fn export_workbook(dir: &Path, extension: &str, dest: &Path) -> Result<AggregateReport> {
    info!("exporting data to workbook");

    let collected = collect_tables(dir, extension)?;
    let (sheets, unfit) = plan_sheets(collected.tables);

    let mut report = AggregateReport {
        workbook: None,
        sheets: Vec::new(),
        skipped: collected.skipped,
    };
    report.skipped.extend(unfit);

    if sheets.is_empty() {
        warn!("no data to export, skipping workbook creation");
        return Ok(report);
    }

    write_workbook(&sheets, dest)?;

    report.sheets = sheets
        .iter()
        .map(|s| SheetSummary {
            sheet: s.name.clone(),
            source: s.source.clone(),
            rows: s.table.rows.len(),
        })
        .collect();
    report.workbook = Some(dest.to_path_buf());

    info!(sheets = report.sheets.len(), path = %dest.display(), "data exported to workbook");
    Ok(report)
}

// ---------------------------------------------------------------------------
// Phase 1: collect
// ---------------------------------------------------------------------------

/// Parse every regular file in `dir` whose extension matches (case-insensitive).
///
/// Files are visited in file-name order. Parse failures are logged and
/// returned as skipped; only failing to list `dir` itself is an error.
pub fn collect_tables(dir: &Path, extension: &str) -> Result<Collected> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| SeoBatchError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()));

    let mut collected = Collected::default();
    for path in export_candidates(dir, entries, extension) {
        match read_table(&path) {
            Ok(table) => collected.tables.push(LoadedTable {
                source: path,
                table,
            }),
            Err(e) => {
                error!(file = %path.display(), error = %e, "error processing export, skipping");
                collected.skipped.push(SkippedFile {
                    file: path,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(collected)
}

/// Sorted regular files with a matching extension. Unreadable entries are logged and dropped.
fn export_candidates<I>(dir: &Path, entries: I, extension: &str) -> Vec<PathBuf>
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
{
    let mut candidates: Vec<PathBuf> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "unreadable entry in output folder, skipping");
                None
            }
        })
        .filter(|path| path.is_file() && has_extension(path, extension))
        .collect();
    candidates.sort();
    candidates
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Read one delimited export. Rows may be shorter than the header, not longer.
pub fn read_table(path: &Path) -> Result<Table> {
    let parse_err = |e: csv::Error| SeoBatchError::parse(format!("{}: {e}", path.display()));

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(parse_err)?;

    let headers: Vec<String> = rdr
        .headers()
        .map_err(parse_err)?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(SeoBatchError::parse(format!(
            "{}: no columns to parse",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(parse_err)?;
        if record.len() > headers.len() {
            let line = record.position().map_or(0, |p| p.line());
            return Err(SeoBatchError::parse(format!(
                "{}: line {line} has {} fields, expected {}",
                path.display(),
                record.len(),
                headers.len()
            )));
        }
        rows.push(record.iter().map(String::from).collect());
    }

    Ok(Table { headers, rows })
}

// ---------------------------------------------------------------------------
// Phase 2: plan
// ---------------------------------------------------------------------------

/// Drop empty or over-wide tables and give the rest unique sheet names,
/// keeping input order.
///
/// Returns the planned sheets and the tables that were skipped.
pub fn plan_sheets(tables: Vec<LoadedTable>) -> (Vec<PlannedSheet>, Vec<SkippedFile>) {
    let mut taken = HashSet::new();
    let mut sheets = Vec::new();
    let mut skipped = Vec::new();

    for LoadedTable { source, mut table } in tables {
        if table.is_empty() {
            info!(file = %source.display(), "export has no rows, skipping");
            skipped.push(SkippedFile {
                file: source,
                reason: "no data rows".into(),
            });
            continue;
        }

        let width = table
            .rows
            .iter()
            .map(Vec::len)
            .chain([table.headers.len()])
            .max()
            .unwrap_or(0);
        if width > MAX_COLUMNS {
            error!(
                file = %source.display(),
                columns = width,
                limit = MAX_COLUMNS,
                "export exceeds worksheet column limit, skipping"
            );
            skipped.push(SkippedFile {
                file: source,
                reason: format!("{width} columns, a worksheet holds at most {MAX_COLUMNS}"),
            });
            continue;
        }

        let base = sheet_name_for(&source);
        let name = unique_sheet_name(&base, &mut taken);
        if name != base {
            warn!(file = %source.display(), sheet = %name, "sheet name already used, renamed");
        }

        if table.rows.len() > MAX_DATA_ROWS {
            warn!(
                file = %source.display(),
                rows = table.rows.len(),
                kept = MAX_DATA_ROWS,
                "export exceeds worksheet row limit, truncating"
            );
            table.rows.truncate(MAX_DATA_ROWS);
        }

        sheets.push(PlannedSheet {
            name,
            source,
            table,
        });
    }

    (sheets, skipped)
}

/// Sheet name derived from a file's base name.
pub fn sheet_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_sheet_name(&stem)
}

/// Replace illegal characters, strip edge apostrophes, cap at 31 characters.
pub fn sanitize_sheet_name(raw: &str) -> String {
    let cleaned = ILLEGAL_SHEET_CHARS.replace_all(raw, "_");
    let truncated: String = cleaned
        .trim_matches('\'')
        .chars()
        .take(MAX_SHEET_NAME_LEN)
        .collect();
    let name = truncated.trim_end_matches('\'');
    if name.is_empty() {
        "Sheet".to_string()
    } else {
        name.to_string()
    }
}

/// `base`, or `base` with a `~N` suffix if a name equal ignoring case is taken.
fn unique_sheet_name(base: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(base.to_lowercase()) {
        return base.to_string();
    }

    let mut n = 1usize;
    loop {
        n += 1;
        let suffix = format!("~{n}");
        let keep = MAX_SHEET_NAME_LEN - suffix.chars().count();
        let candidate: String = base.chars().take(keep).chain(suffix.chars()).collect();
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
    }
}
