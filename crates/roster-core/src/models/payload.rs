//! Parsing for roster payloads.
//!
//! The snapshot and the live backend serve the same family of shapes:
//! `{"contacts": [...]}`, `{"values": [[...]]}`, or a bare array of either
//! entry objects or spreadsheet rows.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::entry::{normalize_department, RosterEntry};
use crate::api::SourceError;

/// Spreadsheet rows as text cells. Row 0 is the header row.
pub type RawRows = Vec<Vec<String>>;

fn name_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(.+?)\s+NAME$").expect("static regex"))
}

/// Parse a JSON body into normalized entries.
pub fn parse_str(body: &str) -> Result<Vec<RosterEntry>, SourceError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;
    parse_payload(&value)
}

/// Parse any accepted payload shape. Zero surviving entries is `EmptyResult`.
pub fn parse_payload(value: &Value) -> Result<Vec<RosterEntry>, SourceError> {
    let entries = match value {
        Value::Object(map) => {
            if let Some(contacts) = map.get("contacts") {
                parse_list(contacts)?
            } else if let Some(values) = map.get("values") {
                let rows = rows_from_value(values).ok_or_else(|| {
                    SourceError::Parse("\"values\" is not a list of rows".to_string())
                })?;
                parse_raw_rows(&rows)
            } else {
                return Err(SourceError::Parse(
                    "object has neither \"contacts\" nor \"values\"".to_string(),
                ));
            }
        }
        Value::Array(_) => parse_list(value)?,
        other => {
            return Err(SourceError::Parse(format!(
                "unexpected top-level JSON {}",
                json_kind(other)
            )))
        }
    };

    if entries.is_empty() {
        return Err(SourceError::EmptyResult);
    }
    Ok(entries)
}

fn parse_list(value: &Value) -> Result<Vec<RosterEntry>, SourceError> {
    let items = value
        .as_array()
        .ok_or_else(|| SourceError::Parse(format!("expected a list, got {}", json_kind(value))))?;

    // An array whose first element is itself an array is spreadsheet rows.
    if matches!(items.first(), Some(Value::Array(_))) {
        let rows = rows_from_value(value).unwrap_or_default();
        return Ok(parse_raw_rows(&rows));
    }

    Ok(items.iter().filter_map(entry_from_value).collect())
}

/// Read one entry object. Numeric name/phone cells are taken as text, the
/// same way spreadsheet cells are.
fn entry_from_value(item: &Value) -> Option<RosterEntry> {
    let Some(fields) = item.as_object() else {
        debug!(kind = json_kind(item), "Skipping malformed roster entry");
        return None;
    };
    let field = |name: &str| fields.get(name).and_then(cell_text);
    let (Some(name), Some(phone)) = (field("name"), field("phone")) else {
        debug!("Skipping roster entry without name or phone");
        return None;
    };
    RosterEntry::new(&name, &phone, &field("department").unwrap_or_default())
}

fn cell_text(cell: &Value) -> Option<String> {
    match cell {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Coerce a JSON array of arrays into text rows. Numbers become text,
/// other cells become empty. A row that is not an array becomes an empty
/// row, so it yields nothing but keeps the header in place.
pub fn rows_from_value(value: &Value) -> Option<RawRows> {
    let rows = value
        .as_array()?
        .iter()
        .enumerate()
        .map(|(i, row)| match row.as_array() {
            Some(cells) => cells
                .iter()
                .map(|cell| cell_text(cell).unwrap_or_default())
                .collect(),
            None => {
                debug!(row = i, kind = json_kind(row), "Skipping malformed row");
                Vec::new()
            }
        })
        .collect();
    Some(rows)
}

/// Column pairs in a header row: `(name column index, department)`.
///
/// A pair is kept when both headers are non-blank and the name header reads
/// `"<DEPT> NAME"`.
pub fn department_columns(header: &[String]) -> Vec<(usize, String)> {
    let mut columns = Vec::new();
    for i in (0..header.len()).step_by(2) {
        let name_header = header[i].trim();
        let phone_header = header.get(i + 1).map(|h| h.trim()).unwrap_or("");
        if name_header.is_empty() || phone_header.is_empty() {
            continue;
        }
        match name_header_regex().captures(name_header) {
            Some(caps) => columns.push((i, normalize_department(&caps[1]))),
            None => debug!(header = name_header, "Skipping unmatched header"),
        }
    }
    columns
}

/// Convert header/value rows into entries, column pair by column pair.
pub fn parse_raw_rows(rows: &[Vec<String>]) -> Vec<RosterEntry> {
    let Some((header, body)) = rows.split_first() else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for (col, department) in department_columns(header) {
        for row in body {
            let (Some(name), Some(phone)) = (row.get(col), row.get(col + 1)) else {
                continue;
            };
            if let Some(entry) = RosterEntry::new(name, phone, &department) {
                entries.push(entry);
            }
        }
    }
    entries
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
