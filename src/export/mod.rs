//! Turning a selection of records into a downloadable file.
//!
//! Every format renders the same [`ExportTable`]: a title, the projected
//! columns and one row of [`FieldValue`]s per record.

mod columns;
mod excel;
mod pdf;
mod text;

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    listing::{FieldValue, Listable},
};

pub const EMPTY_EXPORT_MESSAGE: &str = "No records selected for export";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[serde(alias = "xlsx")]
    Excel,
    Pdf,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Excel => "excel",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Excel => "xlsx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

/// A record type with an export layout.
pub trait Exportable: Listable {
    /// Sheet and document title.
    const TITLE: &'static str;
    const FILE_STEM: &'static str;
    const DEFAULT_COLUMNS: &'static [&'static str];

    fn column_label(field: &str) -> String {
        humanize(field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub field: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct ExportTable {
    pub title: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<FieldValue>>,
}

#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl IntoResponse for ExportFile {
    fn into_response(self) -> Response {
        let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", self.filename))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

        let mut response = Response::new(self.bytes.into());
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        headers.insert(header::CONTENT_DISPOSITION, disposition);
        response
    }
}

/// `member_count` → `Member Count`.
pub fn humanize(field: &str) -> String {
    field
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The requested projection, or the defaults. Unknown fields are rejected;
/// repeats are dropped.
pub fn resolve_columns<T: Exportable>(requested: Option<&[String]>) -> Result<Vec<Column>> {
    let fields: Vec<String> = match requested {
        Some(fields) if !fields.is_empty() => fields.iter().map(|f| f.trim().to_string()).collect(),
        _ => T::DEFAULT_COLUMNS.iter().map(|f| f.to_string()).collect(),
    };

    let mut columns: Vec<Column> = Vec::with_capacity(fields.len());
    for field in fields {
        if !T::FIELDS.contains(&field.as_str()) {
            return Err(AppError::BadRequest(format!("Unknown export column: {}", field)));
        }
        if columns.iter().any(|c| c.field == field) {
            continue;
        }
        columns.push(Column {
            label: T::column_label(&field),
            field,
        });
    }
    Ok(columns)
}

pub fn build_table<T: Exportable>(records: &[&T], columns: Vec<Column>) -> ExportTable {
    let rows = records
        .iter()
        .map(|record| columns.iter().map(|c| record.field(&c.field)).collect())
        .collect();
    ExportTable {
        title: T::TITLE.to_string(),
        columns,
        rows,
    }
}

pub fn export_records<T: Exportable>(
    records: &[&T],
    format: ExportFormat,
    columns: Option<&[String]>,
) -> Result<ExportFile> {
    if records.is_empty() {
        return Err(AppError::BadRequest(EMPTY_EXPORT_MESSAGE.to_string()));
    }

    let table = build_table(records, resolve_columns::<T>(columns)?);
    let bytes = match format {
        ExportFormat::Csv => text::write_csv(&table)?,
        ExportFormat::Excel => excel::write_xlsx(&table)?,
        ExportFormat::Pdf => pdf::write_pdf(&table)?,
    };

    tracing::info!("Exported {} {} rows as {}", table.rows.len(), T::TITLE, format.as_str());

    Ok(ExportFile {
        filename: format!(
            "{}_{}.{}",
            T::FILE_STEM,
            Utc::now().format("%Y%m%d_%H%M%S"),
            format.extension()
        ),
        content_type: format.content_type(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Branch, Cluster};
    use uuid::Uuid;

    fn branch(name: &str) -> Branch {
        Branch {
            id: Uuid::new_v4(),
            code: name.to_uppercase(),
            name: name.to_string(),
            address: None,
            is_active: true,
            is_headquarters: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("member_count"), "Member Count");
        assert_eq!(humanize("name"), "Name");
    }

    #[test]
    fn test_empty_export_is_refused() {
        let records: Vec<&Branch> = Vec::new();
        let err = export_records(&records, ExportFormat::Csv, None).unwrap_err();
        match err {
            AppError::BadRequest(msg) => assert_eq!(msg, EMPTY_EXPORT_MESSAGE),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let requested = vec!["name".to_string(), "password_hash".to_string()];
        assert!(resolve_columns::<Branch>(Some(&requested)).is_err());
    }

    #[test]
    fn test_projection_keeps_requested_order() {
        let requested = vec!["member_count".to_string(), "name".to_string(), "name".to_string()];
        let columns = resolve_columns::<Cluster>(Some(&requested)).unwrap();
        let fields: Vec<&str> = columns.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["member_count", "name"]);
    }

    #[test]
    fn test_csv_export_has_header_and_rows() {
        let a = branch("Central");
        let b = branch("North");
        let columns = vec!["code".to_string(), "name".to_string(), "is_active".to_string()];
        let file = export_records(&[&a, &b], ExportFormat::Csv, Some(&columns)).unwrap();
        let text = String::from_utf8(file.bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["Code,Name,Is Active", "CENTRAL,Central,Yes", "NORTH,North,Yes"]);
        assert!(file.filename.starts_with("branches_"));
        assert!(file.filename.ends_with(".csv"));
    }

    #[test]
    fn test_binary_formats_produce_documents() {
        let a = branch("Central");
        let xlsx = export_records(&[&a], ExportFormat::Excel, None).unwrap();
        // xlsx is a zip archive
        assert_eq!(&xlsx.bytes[..2], b"PK");
        let pdf = export_records(&[&a], ExportFormat::Pdf, None).unwrap();
        assert!(pdf.bytes.starts_with(b"%PDF"));
    }
}
