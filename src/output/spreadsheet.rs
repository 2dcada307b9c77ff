//! Spreadsheet (xlsx) export

use super::{ExportRow, ExportWriter, OutputResult, PersistedRecord, COLUMNS};
use rust_xlsxwriter::{Format, Workbook};

/// Maximum auto-sized column width, in characters
pub const MAX_COLUMN_WIDTH: usize = 50;

/// Cell text limit imposed by the xlsx format
pub const MAX_CELL_CHARS: usize = 32_767;

const SHEET_NAME: &str = "Products";

/// Single-sheet workbook with a bold header row
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetExport;

/// Width for a column whose longest cell has `longest` characters
pub fn column_width(longest: usize) -> usize {
    (longest + 2).min(MAX_COLUMN_WIDTH)
}

fn truncate_cell(value: &str) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

impl ExportWriter for SpreadsheetExport {
    fn extension(&self) -> &'static str {
        "xlsx"
    }

    fn render(&self, records: &[PersistedRecord]) -> OutputResult<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        let header = Format::new().set_bold();
        let mut longest: Vec<usize> = COLUMNS.iter().map(|c| c.chars().count()).collect();

        for (col, title) in COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *title, &header)?;
        }

        for (idx, record) in records.iter().enumerate() {
            let row = ExportRow::from(&record.product);
            let row_num = (idx + 1) as u32;

            for (col, value) in row.cells().iter().enumerate() {
                let value = truncate_cell(value);
                longest[col] = longest[col].max(value.chars().count());
                worksheet.write_string(row_num, col as u16, value)?;
            }
        }

        for (col, len) in longest.into_iter().enumerate() {
            worksheet.set_column_width(col as u16, column_width(len) as f64)?;
        }

        Ok(workbook.save_to_buffer()?)
    }
}
