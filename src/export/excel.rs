use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::{
    error::{AppError, Result},
    listing::FieldValue,
};

use super::ExportTable;

/// Sheet names are capped at 31 characters and may not contain `[]:*?/\`.
fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Export".to_string()
    } else {
        cleaned
    }
}

pub(super) fn write_xlsx(table: &ExportTable) -> Result<Vec<u8>> {
    build(table).map_err(|e| AppError::Export(format!("Failed to build spreadsheet: {}", e)))
}

fn build(table: &ExportTable) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(&table.title))?;

    for (col, column) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, &column.label, &header)?;
    }

    for (index, row) in table.rows.iter().enumerate() {
        let row_num = (index + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            let col = col as u16;
            match value {
                FieldValue::Number(n) => {
                    worksheet.write_number(row_num, col, *n)?;
                }
                FieldValue::Null => {}
                other => {
                    worksheet.write_string(row_num, col, other.display())?;
                }
            }
        }
    }

    worksheet.set_freeze_panes(1, 0)?;
    worksheet.autofit();

    workbook.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_name_is_sanitized() {
        assert_eq!(sheet_name("People"), "People");
        assert_eq!(sheet_name("Reports [2024/25]"), "Reports 202425");
        assert_eq!(sheet_name("???"), "Export");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
    }
}
