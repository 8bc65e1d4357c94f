use std::borrow::Cow;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, XlsxError};
use thiserror::Error;

use super::{Sheet, Workbook, COL_COUNT};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const MIN_COLUMN_WIDTH: f64 = 10.0;
const MAX_COLUMN_WIDTH: f64 = 80.0;

/// Excel rejects cells holding more characters than this.
pub const MAX_CELL_CHARS: usize = 32_767;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize `workbook` to `.xlsx` bytes.
pub fn workbook_to_bytes(workbook: &Workbook) -> Result<Vec<u8>, ExportError> {
    let mut xlsx = render(workbook)?;
    Ok(xlsx.save_to_buffer()?)
}

/// Write `workbook` into `dir` under its file name, returning the full path.
pub fn write_workbook(workbook: &Workbook, dir: &Path) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(&workbook.file_name);
    let mut xlsx = render(workbook)?;
    xlsx.save(&path)?;
    tracing::debug!("Saved workbook to {}", path.display());
    Ok(path)
}

fn render(workbook: &Workbook) -> Result<XlsxWorkbook, ExportError> {
    let mut xlsx = XlsxWorkbook::new();
    let header = Format::new().set_bold();

    for sheet in &workbook.sheets {
        let worksheet = xlsx.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col, name) in sheet.columns.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, name, &header)?;
        }

        let numeric = numeric_columns(sheet);
        for (i, row) in sheet.rows.iter().enumerate() {
            let row_num = (i + 1) as u32;
            for (col, value) in row.iter().enumerate() {
                let is_numeric = numeric.get(col).copied().unwrap_or(false);
                match is_numeric.then(|| value.parse::<f64>().ok()).flatten() {
                    Some(n) => worksheet.write_number(row_num, col as u16, n)?,
                    None => {
                        let cell = fit_cell(value);
                        if matches!(cell, Cow::Owned(_)) {
                            tracing::warn!(
                                "Truncated {} cell in row {} of '{}' to {} characters",
                                sheet.columns.get(col).map(String::as_str).unwrap_or("?"),
                                row_num,
                                sheet.name,
                                MAX_CELL_CHARS
                            );
                        }
                        worksheet.write_string(row_num, col as u16, cell.as_ref())?
                    }
                };
            }
        }

        for (col, width) in column_widths(sheet).into_iter().enumerate() {
            worksheet.set_column_width(col as u16, width)?;
        }
    }

    Ok(xlsx)
}

/// Cut `value` down to [`MAX_CELL_CHARS`] characters. Short values are borrowed.
fn fit_cell(value: &str) -> Cow<'_, str> {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => Cow::Owned(value[..end].to_string()),
        None => Cow::Borrowed(value),
    }
}

/// `Count` columns are written as numbers when every value is an integer.
fn numeric_columns(sheet: &Sheet) -> Vec<bool> {
    sheet
        .columns
        .iter()
        .enumerate()
        .map(|(col, name)| {
            name == COL_COUNT
                && sheet
                    .rows
                    .iter()
                    .all(|row| row.get(col).is_some_and(|v| v.parse::<u64>().is_ok()))
        })
        .collect()
}

fn column_widths(sheet: &Sheet) -> Vec<f64> {
    sheet
        .columns
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let longest = sheet
                .rows
                .iter()
                .filter_map(|row| row.get(col))
                .map(|v| v.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0);
            (longest as f64 + 2.0).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{counts_view, Workbook};
    use crate::models::FeedbackRecord;

    fn records() -> Vec<FeedbackRecord> {
        vec![
            FeedbackRecord::new("Great app!", vec!["Positive".into()]),
            FeedbackRecord::new("Crashes on load", vec!["Bug".into()]),
        ]
    }

    #[test]
    fn count_column_is_numeric() {
        let sheet = counts_view(&records());
        assert_eq!(numeric_columns(&sheet), vec![false, true]);
    }

    #[test]
    fn column_widths_are_clamped() {
        let mut records = records();
        records.push(FeedbackRecord::new("x".repeat(200), vec![]));
        let sheet = crate::export::compiled_view(&records);
        let widths = column_widths(&sheet);
        assert_eq!(widths[0], MAX_COLUMN_WIDTH);
        assert_eq!(widths[1], MIN_COLUMN_WIDTH);
    }

    #[test]
    fn fit_cell_truncates_on_char_boundaries() {
        assert!(matches!(fit_cell("short"), Cow::Borrowed("short")));

        let exact = "x".repeat(MAX_CELL_CHARS);
        assert!(matches!(fit_cell(&exact), Cow::Borrowed(_)));

        let long = "é".repeat(MAX_CELL_CHARS + 10);
        let cell = fit_cell(&long);
        assert_eq!(cell.chars().count(), MAX_CELL_CHARS);
        assert!(cell.chars().all(|c| c == 'é'));
    }

    #[test]
    fn over_long_cells_still_export() {
        let huge = "x".repeat(40_000);
        let records = vec![
            FeedbackRecord::new("short", vec!["Bug".into()]),
            FeedbackRecord::new(huge.clone(), vec![huge]),
        ];

        let bytes = workbook_to_bytes(&Workbook::detailed(&records)).unwrap();
        assert!(bytes.starts_with(b"PK"));
        assert!(workbook_to_bytes(&Workbook::basic(&records)).is_ok());
    }

    #[test]
    fn workbook_bytes_are_a_zip_archive() {
        let bytes = workbook_to_bytes(&Workbook::detailed(&records())).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn writes_workbook_under_its_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workbook(&Workbook::basic(&records()), dir.path()).unwrap();
        assert_eq!(path, dir.path().join("feedback_analysis_results.xlsx"));
        assert!(path.exists());
    }
}
