//! XLSX writer for planned sheets.

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use tracing::{debug, info};

use seobatch_shared::{Result, SeoBatchError};

use crate::aggregate::PlannedSheet;

/// Longest text a single cell can hold.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Write `sheets` to a new workbook at `path`, replacing any existing file.
///
/// Each sheet gets a bold header row followed by its data rows; there is no
/// index column. Numeric-looking cells are stored as numbers.
pub fn write_workbook(sheets: &[PlannedSheet], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        fill_sheet(worksheet, sheet, &header_format)
            .map_err(|e| SeoBatchError::Workbook(format!("sheet '{}': {e}", sheet.name)))?;
        info!(
            file = %sheet.source.display(),
            sheet = %sheet.name,
            rows = sheet.table.rows.len(),
            "added export to workbook"
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SeoBatchError::io(parent, e))?;
    }

    workbook
        .save(path)
        .map_err(|e| SeoBatchError::Workbook(format!("saving {}: {e}", path.display())))?;
    debug!(path = %path.display(), sheets = sheets.len(), "workbook saved");
    Ok(())
}

fn fill_sheet(
    worksheet: &mut Worksheet,
    sheet: &PlannedSheet,
    header_format: &Format,
) -> std::result::Result<(), XlsxError> {
    worksheet.set_name(&sheet.name)?;

    for (col, header) in sheet.table.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col_num(col)?, clip(header), header_format)?;
    }

    for (i, row) in sheet.table.rows.iter().enumerate() {
        let row_num = u32::try_from(i + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (col, cell) in row.iter().enumerate() {
            write_cell(worksheet, row_num, col_num(col)?, cell)?;
        }
    }
    Ok(())
}

fn col_num(col: usize) -> std::result::Result<u16, XlsxError> {
    u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)
}

/// Blank cells stay empty; numbers are written as numbers, everything else as text.
fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &str,
) -> std::result::Result<(), XlsxError> {
    if value.is_empty() {
        return Ok(());
    }
    match as_number(value) {
        Some(n) => worksheet.write_number(row, col, n)?,
        None => worksheet.write_string(row, col, clip(value))?,
    };
    Ok(())
}

fn as_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let looks_numeric = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if !looks_numeric {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn clip(value: &str) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
