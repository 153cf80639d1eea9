use std::io::Write;

use crate::error::{AppError, Result};

use super::ExportTable;

pub(super) fn write_csv(table: &ExportTable) -> Result<Vec<u8>> {
    write_csv_to(table, Vec::new())
}

// `From<csv::Error>` is for uploaded CSV (a 400); writer failures here are
// export errors.
fn write_csv_to<W: Write>(table: &ExportTable, sink: W) -> Result<W> {
    let mut writer = csv::Writer::from_writer(sink);
    let failed = |e: csv::Error| AppError::Export(format!("Failed to write CSV: {}", e));

    writer
        .write_record(table.columns.iter().map(|c| c.label.as_str()))
        .map_err(failed)?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|value| neutralize(value.display())))
            .map_err(failed)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Export(format!("Failed to finish CSV: {}", e)))
}

/// Spreadsheet apps evaluate cells starting with these as formulas.
fn neutralize(cell: String) -> String {
    match cell.chars().next() {
        Some('=' | '+' | '@') => format!("'{}", cell),
        Some('-') if cell.parse::<f64>().is_err() => format!("'{}", cell),
        _ => cell,
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::{export::Column, listing::FieldValue};

    #[derive(Debug)]
    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left"))
        }
    }

    fn table() -> ExportTable {
        ExportTable {
            title: "People".to_string(),
            columns: vec![Column {
                field: "name".to_string(),
                label: "Name".to_string(),
            }],
            rows: vec![vec![FieldValue::text("Ana")]],
        }
    }

    #[test]
    fn test_writer_failure_is_an_export_error() {
        let err = write_csv_to(&table(), FullDisk).unwrap_err();
        assert!(matches!(err, AppError::Export(_)), "{:?}", err);
    }

    #[test]
    fn test_writes_header_then_rows() {
        let bytes = write_csv(&table()).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "Name\nAna\n");
    }

    #[test]
    fn test_formula_cells_are_quoted() {
        assert_eq!(neutralize("=SUM(A1)".to_string()), "'=SUM(A1)");
        assert_eq!(neutralize("-12.5".to_string()), "-12.5");
        assert_eq!(neutralize("-cmd".to_string()), "'-cmd");
        assert_eq!(neutralize("plain".to_string()), "plain");
    }
}
