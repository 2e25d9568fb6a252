//! Dataset files → engine tables. CSV-like text and spreadsheets.

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use listcheck_recon::load::{load_delimited_table, mapping_from_table, normalize_headers, parse_cell, MAPPING_DATASET};
use listcheck_recon::{MappingTable, ReconError, Table, Value};

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "xlsb", "ods"];

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SPREADSHEET_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read a file as UTF-8, falling back to Windows-1252 for Excel-exported text.
pub fn read_file_as_utf8(path: &Path) -> Result<String, ReconError> {
    let io_err = |e: std::io::Error| ReconError::Io(format!("cannot read {}: {e}", path.display()));
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(io_err)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            log::debug!("{} is not UTF-8; decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
            Ok(decoded.into_owned())
        }
    }
}

const DELIMITERS: [u8; 4] = [b'\t', b';', b',', b'|'];

/// Data lines checked against the header when sniffing.
const SNIFF_LINES: usize = 20;

fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|r| r.ok())
        .map_or(1, |r| r.len())
}

/// Pick the delimiter from the header line.
///
/// A candidate must split the header into at least two fields; among those,
/// the one most data lines agree with wins, then the wider header, then
/// `DELIMITERS` order. Comma when the header does not split.
pub fn sniff_delimiter(content: &str) -> u8 {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return b',';
    };
    let body: Vec<&str> = lines.take(SNIFF_LINES).collect();

    DELIMITERS
        .iter()
        .enumerate()
        .filter_map(|(rank, &delim)| {
            let width = field_count(header, delim);
            (width > 1).then_some((rank, delim, width))
        })
        .max_by_key(|&(rank, delim, width)| {
            let agreeing = body.iter().filter(|l| field_count(l, delim) == width).count();
            (agreeing, width, std::cmp::Reverse(rank))
        })
        .map_or(b',', |(_, delim, _)| delim)
}

/// Load one dataset file, dispatching on extension.
pub fn load_table(dataset: &str, path: &Path) -> Result<Table, ReconError> {
    let table = if is_spreadsheet(path) {
        load_spreadsheet(dataset, path)?
    } else {
        let text = read_file_as_utf8(path)?;
        load_delimited_table(dataset, &text, sniff_delimiter(&text))?
    };
    log::info!(
        "{dataset}: {} rows, {} columns from {}",
        table.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}

pub fn load_mapping(path: &Path) -> Result<MappingTable, ReconError> {
    let table = load_table(MAPPING_DATASET, path)?;
    mapping_from_table(&table)
}

/// First sheet, first row as header.
fn load_spreadsheet(dataset: &str, path: &Path) -> Result<Table, ReconError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| ReconError::Io(format!("cannot open {}: {e}", path.display())))?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Err(ReconError::Io(format!("{} contains no sheets", path.display())));
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ReconError::Io(format!("cannot read sheet '{sheet}' of {}: {e}", path.display())))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    let raw: Vec<String> = header.iter().map(header_text).collect();
    let mut table = Table::new(normalize_headers(dataset, raw.iter().map(String::as_str))?);
    for row in rows {
        table.push_row(row.iter().map(cell_value).collect());
    }
    Ok(table)
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => cell_value(other).to_cell(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Missing,
        Data::String(s) => match parse_cell(s) {
            Value::Missing => Value::Missing,
            _ => Value::Text(s.clone()),
        },
        Data::Int(n) => Value::Int(*n),
        // Spreadsheets store whole numbers as floats.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Value::Int(*f as i64),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
    }
}
