//! CSV import of people with duplicate detection.
//!
//! Parsing never touches the database. [`preview`] turns the raw text into
//! rows, row errors and a [`DuplicateReport`]; an import may only proceed
//! when `can_import` is set.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::{ImportConfig, MalformedRowPolicy},
    domain::{CreatePersonRequest, PersonStatus, Role},
    error::{AppError, Result},
};

const REQUIRED_COLUMNS: &[&str] = &["first_name", "last_name"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportCsvRequest {
    pub csv: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    /// 0-based position among data rows.
    pub index: usize,
    /// 1-based line in the source text.
    pub line: u64,
    pub values: BTreeMap<String, String>,
}

impl ImportRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub index: usize,
    pub line: u64,
    pub message: String,
}

/// Indices of rows repeating an earlier row. The first occurrence is never
/// listed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub name_duplicates: Vec<usize>,
    pub member_id_duplicates: Vec<usize>,
}

impl DuplicateReport {
    pub fn is_empty(&self) -> bool {
        self.name_duplicates.is_empty() && self.member_id_duplicates.is_empty()
    }

    pub fn count(&self) -> usize {
        self.name_duplicates
            .iter()
            .chain(&self.member_id_duplicates)
            .collect::<HashSet<_>>()
            .len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPreview {
    pub headers: Vec<String>,
    pub rows: Vec<ImportRow>,
    pub duplicates: DuplicateReport,
    pub errors: Vec<RowError>,
    pub can_import: bool,
    #[serde(skip)]
    pub(crate) requests: Vec<(usize, CreatePersonRequest)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportFailure {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub created: Vec<Uuid>,
    pub failed: Vec<ImportFailure>,
}

/// `" First Name "` → `first_name`, with a few common spellings folded in.
pub fn normalize_header(raw: &str) -> String {
    let key = raw
        .trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    match key.as_str() {
        "firstname" | "first" | "given_name" => "first_name".to_string(),
        "lastname" | "last" | "surname" | "family_name" => "last_name".to_string(),
        "middlename" | "middle" => "middle_name".to_string(),
        "member_code" | "memberid" => "member_id".to_string(),
        "birthday" | "birth_date" | "birthdate" => "date_of_birth".to_string(),
        "mobile" | "phone_number" | "contact_number" => "phone".to_string(),
        _ => key,
    }
}

/// Split the text into rows, applying the malformed-row policy.
pub fn parse(input: &str, config: &ImportConfig) -> Result<(Vec<String>, Vec<ImportRow>, Vec<RowError>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::BadRequest("CSV has no header row".to_string()));
    }
    let mut seen = HashSet::new();
    for header in &headers {
        if header.is_empty() {
            return Err(AppError::BadRequest("CSV has an empty column name".to_string()));
        }
        if !seen.insert(header.as_str()) {
            return Err(AppError::BadRequest(format!("Duplicate column: {}", header)));
        }
    }
    for required in REQUIRED_COLUMNS {
        if !seen.contains(required) {
            return Err(AppError::BadRequest(format!("Missing required column: {}", required)));
        }
    }

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let index = rows.len() + errors.len();
        if index >= config.max_rows {
            return Err(AppError::BadRequest(format!(
                "CSV has more than {} rows",
                config.max_rows
            )));
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
        if let Some(message) = reconcile(&mut cells, headers.len(), config.malformed_rows) {
            errors.push(RowError { index, line, message });
            continue;
        }

        rows.push(ImportRow {
            index,
            line,
            values: headers.iter().cloned().zip(cells).collect(),
        });
    }

    Ok((headers, rows, errors))
}

/// Fit a row to the header width, or describe why it can't be.
fn reconcile(cells: &mut Vec<String>, width: usize, policy: MalformedRowPolicy) -> Option<String> {
    let found = cells.len();
    if found == width {
        return None;
    }
    let mismatch = || format!("Expected {} columns, found {}", width, found);
    match policy {
        MalformedRowPolicy::Reject => Some(mismatch()),
        MalformedRowPolicy::Pad if found > width => Some(mismatch()),
        MalformedRowPolicy::Pad | MalformedRowPolicy::Truncate => {
            cells.resize(width, String::new());
            None
        }
    }
}

pub fn detect_duplicates(rows: &[ImportRow]) -> DuplicateReport {
    let mut names = HashSet::new();
    let mut member_ids = HashSet::new();
    let mut report = DuplicateReport::default();

    for row in rows {
        if let (Some(first), Some(last)) = (row.get("first_name"), row.get("last_name")) {
            if !names.insert((first.to_lowercase(), last.to_lowercase())) {
                report.name_duplicates.push(row.index);
            }
        }
        if let Some(member_id) = row.get("member_id") {
            if !member_ids.insert(member_id.to_lowercase()) {
                report.member_id_duplicates.push(row.index);
            }
        }
    }
    report
}

fn parse_date(column: &str, raw: &str) -> std::result::Result<NaiveDate, String> {
    ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| format!("Invalid date in {}: {}", column, raw))
}

fn opt_date(row: &ImportRow, column: &str) -> std::result::Result<Option<NaiveDate>, String> {
    row.get(column).map(|raw| parse_date(column, raw)).transpose()
}

/// Build a create request from a row. Unknown columns are ignored.
pub fn to_request(row: &ImportRow) -> std::result::Result<CreatePersonRequest, String> {
    let first_name = row.get("first_name").ok_or("first_name is required")?;
    let last_name = row.get("last_name").ok_or("last_name is required")?;
    let text = |column: &str| row.get(column).map(str::to_string);

    let mut request = CreatePersonRequest::new(first_name, last_name);
    request.member_id = text("member_id");
    request.username = text("username");
    request.middle_name = text("middle_name");
    request.suffix = text("suffix");
    request.email = text("email");
    request.phone = text("phone");
    request.address = text("address");
    request.notes = text("notes");

    if let Some(raw) = row.get("role") {
        request.role = Role::from_str(raw).ok_or_else(|| format!("Unknown role: {}", raw))?;
    }
    if let Some(raw) = row.get("status") {
        request.status =
            PersonStatus::from_str(raw).ok_or_else(|| format!("Unknown status: {}", raw))?;
    }
    if let Some(raw) = row.get("branch_id") {
        request.branch_id =
            Some(Uuid::parse_str(raw).map_err(|_| format!("Invalid branch_id: {}", raw))?);
    }
    request.date_of_birth = opt_date(row, "date_of_birth")?;
    request.date_first_attended = opt_date(row, "date_first_attended")?;
    request.water_baptism_date = opt_date(row, "water_baptism_date")?;
    request.spirit_baptism_date = opt_date(row, "spirit_baptism_date")?;

    request.validate().map_err(|e| e.to_string())?;
    Ok(request)
}

pub fn preview(input: &str, config: &ImportConfig) -> Result<ImportPreview> {
    let (headers, rows, mut errors) = parse(input, config)?;

    let mut requests = Vec::with_capacity(rows.len());
    for row in &rows {
        match to_request(row) {
            Ok(request) => requests.push((row.index, request)),
            Err(message) => errors.push(RowError {
                index: row.index,
                line: row.line,
                message,
            }),
        }
    }
    errors.sort_by_key(|e| e.index);

    let duplicates = detect_duplicates(&rows);
    let can_import = !rows.is_empty() && errors.is_empty() && duplicates.is_empty();

    Ok(ImportPreview {
        headers,
        rows,
        duplicates,
        errors,
        can_import,
        requests,
    })
}
