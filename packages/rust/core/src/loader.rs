//! URL list loading from a CSV file or the first sheet of a spreadsheet.

use std::fs::File;
use std::path::Path;

use calamine::{Reader, open_workbook_auto};
use tracing::{debug, info, instrument, warn};

use seobatch_shared::{Result, SeoBatchError, TargetAddress};

/// Extensions read through `calamine` instead of the CSV reader.
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Read the `column` values from `path`, dropping blank cells.
///
/// Fails with [`SeoBatchError::MissingInputFile`] when `path` is not a file and
/// with [`SeoBatchError::Schema`] when the header row lacks `column`. An input
/// with no usable values yields an empty list and a warning.
#[instrument(skip_all, fields(path = %path.display(), column = %column))]
pub fn load_addresses(path: &Path, column: &str) -> Result<Vec<TargetAddress>> {
    if !path.is_file() {
        return Err(SeoBatchError::MissingInputFile {
            path: path.to_path_buf(),
        });
    }

    let values = if is_spreadsheet(path) {
        read_spreadsheet_column(path, column)?
    } else {
        read_csv_column(path, column)?
    };

    let total = values.len();
    let addresses: Vec<TargetAddress> = values
        .iter()
        .filter_map(|v| TargetAddress::parse(v))
        .collect();

    if addresses.is_empty() {
        warn!(rows = total, "no URLs found in the input file");
    } else {
        debug!(dropped = total - addresses.len(), "blank entries dropped");
        info!(count = addresses.len(), "loaded URLs");
    }

    Ok(addresses)
}

fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Position of `column` in a header row. Surrounding whitespace and a BOM are ignored.
fn find_column<I, S>(headers: I, column: &str) -> Option<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let wanted = column.trim();
    headers
        .into_iter()
        .position(|h| h.as_ref().trim_start_matches('\u{feff}').trim() == wanted)
}

fn missing_column(column: &str) -> SeoBatchError {
    SeoBatchError::schema(format!("the input file must have a '{column}' column"))
}

fn read_csv_column(path: &Path, column: &str) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| SeoBatchError::io(path, e))?;
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(file);

    let headers = rdr
        .headers()
        .map_err(|e| SeoBatchError::parse(format!("{}: {e}", path.display())))?;
    let idx = find_column(headers.iter(), column).ok_or_else(|| missing_column(column))?;

    let mut values = Vec::new();
    for record in rdr.records() {
        let record =
            record.map_err(|e| SeoBatchError::parse(format!("{}: {e}", path.display())))?;
        values.push(record.get(idx).unwrap_or_default().to_string());
    }
    Ok(values)
}

fn read_spreadsheet_column(path: &Path, column: &str) -> Result<Vec<String>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| SeoBatchError::parse(format!("{}: {e}", path.display())))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SeoBatchError::schema("the input workbook has no worksheets"))?
        .map_err(|e| SeoBatchError::parse(format!("{}: {e}", path.display())))?;

    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| missing_column(column))?;
    let idx = find_column(header.iter().map(|cell| cell.to_string()), column)
        .ok_or_else(|| missing_column(column))?;

    Ok(rows
        .map(|row| row.get(idx).map(|cell| cell.to_string()).unwrap_or_default())
        .collect())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("seobatch-loader-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn as_strings(addresses: &[TargetAddress]) -> Vec<&str> {
        addresses.iter().map(TargetAddress::as_str).collect()
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = temp_dir();
        let err = load_addresses(&dir.join("urls.csv"), "URL").unwrap_err();
        assert!(matches!(err, SeoBatchError::MissingInputFile { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_column_is_schema_error() {
        let dir = temp_dir();
        let path = dir.join("urls.csv");
        std::fs::write(&path, "Site,Owner\nhttps://a.example,me\n").unwrap();

        let err = load_addresses(&path, "URL").unwrap_err();
        assert!(matches!(err, SeoBatchError::Schema { .. }));
        assert!(err.to_string().contains("'URL'"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn blanks_dropped_order_preserved() {
        let dir = temp_dir();
        let path = dir.join("urls.csv");
        std::fs::write(
            &path,
            "\u{feff}Name,URL\n\
             a,https://a.example\n\
             b,\n\
             c,  https://c.example  \n\
             d,   \n\
             e\n\
             f,https://a.example\n",
        )
        .unwrap();

        let addresses = load_addresses(&path, "URL").unwrap();
        assert_eq!(
            as_strings(&addresses),
            vec!["https://a.example", "https://c.example", "https://a.example"]
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn column_without_values_is_empty_not_error() {
        let dir = temp_dir();
        let path = dir.join("urls.csv");
        std::fs::write(&path, "URL\n\n  \n").unwrap();

        let addresses = load_addresses(&path, "URL").unwrap();
        assert!(addresses.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reads_first_sheet_of_workbook() {
        let dir = temp_dir();
        let path = dir.join("urls.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Client").unwrap();
        sheet.write_string(0, 1, "URL").unwrap();
        sheet.write_string(1, 0, "one").unwrap();
        sheet.write_string(1, 1, "https://one.example").unwrap();
        sheet.write_string(2, 0, "two").unwrap();
        sheet.write_string(3, 1, "https://three.example").unwrap();
        workbook.save(&path).unwrap();

        let addresses = load_addresses(&path, "URL").unwrap();
        assert_eq!(
            as_strings(&addresses),
            vec!["https://one.example", "https://three.example"]
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn spreadsheet_detection_is_case_insensitive() {
        assert!(is_spreadsheet(Path::new("Sites.XLSX")));
        assert!(!is_spreadsheet(Path::new("urls.csv")));
        assert!(!is_spreadsheet(Path::new("urls")));
    }
}
