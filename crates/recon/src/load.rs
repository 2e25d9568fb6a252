use std::collections::HashSet;

use crate::align::{FieldMapping, MappingTable};
use crate::error::ReconError;
use crate::model::{Table, Value};

pub const MAPPING_DATASET: &str = "mapping";

/// Cell texts read as missing values.
const NA_MARKERS: [&str; 9] = ["nan", "NaN", "NULL", "null", "#N/A", "N/A", "n/a", "<NA>", "None"];

/// Trim, collapse whitespace runs and repeated underscores to `_`, lowercase.
pub fn normalize_header(raw: &str) -> String {
    let joined = raw.split_whitespace().collect::<Vec<_>>().join("_");
    let mut out = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Typed value of one raw cell. Text is never trimmed.
pub fn parse_cell(raw: &str) -> Value {
    if raw.is_empty() || NA_MARKERS.contains(&raw) {
        return Value::Missing;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    // "007" stays text: only canonical integer spellings become numbers.
    if let Ok(n) = raw.parse::<i64>() {
        if n.to_string() == raw.trim_start_matches('+') {
            return Value::Int(n);
        }
    }
    let numeric = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if numeric && raw.contains(['.', 'e', 'E']) {
        if let Ok(f) = raw.parse::<f64>() {
            return Value::Float(f);
        }
    }
    Value::Text(raw.to_string())
}

/// Normalize a header row into unique column names.
///
/// Blank headers become `unnamed_{position}`; two headers normalizing to the
/// same name are a schema error.
pub fn normalize_headers<'a>(
    dataset: &str,
    raw: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<String>, ReconError> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for (i, raw) in raw.into_iter().enumerate() {
        let mut name = normalize_header(raw);
        if name.is_empty() {
            name = format!("unnamed_{i}");
        }
        if !seen.insert(name.clone()) {
            return Err(ReconError::DuplicateColumn {
                dataset: dataset.into(),
                column: name,
            });
        }
        columns.push(name);
    }
    Ok(columns)
}

/// Load comma-separated text into a [`Table`].
pub fn load_csv_table(dataset: &str, csv_data: &str) -> Result<Table, ReconError> {
    load_delimited_table(dataset, csv_data, b',')
}

/// Load delimited text into a [`Table`] with normalized headers.
///
/// Empty input yields a table with no columns. Short rows are padded with
/// missing values; long rows are truncated with a warning.
pub fn load_delimited_table(dataset: &str, data: &str, delimiter: u8) -> Result<Table, ReconError> {
    let data = data.strip_prefix('\u{feff}').unwrap_or(data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(data.as_bytes());

    let raw_headers = reader
        .headers()
        .map_err(|e| ReconError::Io(format!("{dataset}: {e}")))?
        .clone();

    let columns = normalize_headers(dataset, raw_headers.iter())?;
    let width = columns.len();
    let mut table = Table::new(columns);
    let mut truncated = 0usize;
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Io(format!("{dataset}: {e}")))?;
        if record.len() > width {
            truncated += 1;
        }
        table.push_row(record.iter().take(width).map(parse_cell).collect());
    }

    if truncated > 0 {
        log::warn!("{dataset}: {truncated} rows had more fields than the header; extra fields dropped");
    }
    log::debug!("{dataset}: loaded {} rows x {} columns", table.len(), width);
    Ok(table)
}

/// Load the field mapping from CSV text.
///
/// Columns `authority_column` / `counterpart_column` (or `ccp_column` /
/// `at_column`). Names are normalized like headers; fully empty rows are
/// dropped and an empty counterpart marks an authority-only field.
pub fn load_mapping_csv(csv_data: &str) -> Result<MappingTable, ReconError> {
    mapping_from_table(&load_csv_table(MAPPING_DATASET, csv_data)?)
}

/// Read mapping entries out of an already loaded mapping table.
pub fn mapping_from_table(table: &Table) -> Result<MappingTable, ReconError> {
    let find = |names: [&str; 2]| -> Result<usize, ReconError> {
        names
            .iter()
            .find_map(|n| table.column_index(n))
            .ok_or_else(|| ReconError::schema(MAPPING_DATASET, names[0], &table.columns))
    };
    let authority_idx = find(["authority_column", "ccp_column"])?;
    let counterpart_idx = find(["counterpart_column", "at_column"])?;

    let mut entries = Vec::with_capacity(table.len());
    for row in &table.rows {
        let cell = |i: usize| row.get(i).map(|v| normalize_header(&v.to_cell())).unwrap_or_default();
        let authority = cell(authority_idx);
        let counterpart = cell(counterpart_idx);
        match (authority.is_empty(), counterpart.is_empty()) {
            (true, true) => continue,
            (true, false) => {
                log::warn!("mapping row for counterpart field '{counterpart}' names no authority field; ignored");
                continue;
            }
            (false, true) => entries.push(FieldMapping::authority_only(authority)),
            (false, false) => entries.push(FieldMapping::mapped(authority, counterpart)),
        }
    }

    MappingTable::new(entries)
}
