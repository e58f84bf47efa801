//! Delimited text export of report results.
//!
//! ```text
//! productName,unitPrice
//! "B","200"
//! "C","150"
//! ```
//!
//! The header is the requested field names. Every value is quoted with
//! internal quotes doubled; fields are comma-joined, rows newline-joined.

use crmkit_schema::catalog::stringify;
use serde_json::Value;

use crate::report::{ReportSpec, RunResult};

pub fn to_delimited(spec: &ReportSpec, result: &RunResult) -> String {
    let mut lines = Vec::with_capacity(result.rows.len() + 1);
    lines.push(spec.fields.join(","));
    for row in &result.rows {
        let cells: Vec<String> = spec
            .fields
            .iter()
            .map(|f| quote(row.get(f).unwrap_or(&Value::Null)))
            .collect();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

fn quote(value: &Value) -> String {
    format!("\"{}\"", stringify(value).replace('"', "\"\""))
}

/// Parse delimited text back into a header and rows of cell strings.
///
/// Accepts quoted and bare cells. Quoted cells may contain commas, doubled
/// quotes and newlines.
pub fn parse_delimited(text: &str) -> (Vec<String>, Vec<Vec<String>>) {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    // Whether the current line has any content, even an empty quoted cell
    let mut pending = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        pending = true;
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                chars.next();
                cell.push('"');
            }
            (true, '"') => quoted = false,
            (true, c) => cell.push(c),
            (false, '"') => quoted = true,
            (false, ',') => record.push(std::mem::take(&mut cell)),
            (false, '\r') if chars.peek() == Some(&'\n') => {}
            (false, '\n') => {
                record.push(std::mem::take(&mut cell));
                records.push(std::mem::take(&mut record));
                pending = false;
            }
            (false, c) => cell.push(c),
        }
    }
    if pending {
        record.push(cell);
        records.push(record);
    }

    let mut records = records.into_iter();
    let header = records.next().unwrap_or_default();
    (header, records.collect())
}
