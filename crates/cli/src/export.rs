//! Result files: per-partition CSVs and a one-file Excel report.

use std::path::{Path, PathBuf};

use listcheck_recon::{ReconResult, Table, Value};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

pub const SUMMARY_FILE: &str = "00_summary.csv";
pub const AUTHORITY_ONLY_FILE: &str = "01_authority_only.csv";
pub const COUNTERPART_ONLY_FILE: &str = "02_counterpart_only.csv";
pub const MISMATCHED_FILE: &str = "03_mismatched.csv";

fn summary_table(result: &ReconResult) -> Table {
    let mut table = Table::new(vec!["metric".into(), "value".into()]);
    for (metric, value) in result.statistics.as_map() {
        table.push_row(vec![Value::text(metric), Value::Int(value as i64)]);
    }
    table
}

fn write_csv(path: &Path, table: &Table) -> Result<(), String> {
    let mut writer =
        csv::Writer::from_path(path).map_err(|e| format!("cannot create {}: {e}", path.display()))?;
    writer
        .write_record(&table.columns)
        .map_err(|e| format!("cannot write {}: {e}", path.display()))?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(Value::to_cell))
            .map_err(|e| format!("cannot write {}: {e}", path.display()))?;
    }
    writer.flush().map_err(|e| format!("cannot write {}: {e}", path.display()))
}

/// Write the four partition CSVs into `dir`, creating it if needed.
pub fn write_partition_csvs(dir: &Path, result: &ReconResult) -> Result<Vec<PathBuf>, String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("cannot create {}: {e}", dir.display()))?;

    let files = [
        (SUMMARY_FILE, summary_table(result)),
        (AUTHORITY_ONLY_FILE, result.authority_only.clone()),
        (COUNTERPART_ONLY_FILE, result.counterpart_only.clone()),
        (MISMATCHED_FILE, result.mismatched_table()),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, table) in &files {
        let path = dir.join(name);
        write_csv(&path, table)?;
        written.push(path);
    }
    Ok(written)
}

fn write_sheet(sheet: &mut Worksheet, table: &Table, header: &Format) -> Result<(), XlsxError> {
    for (c, name) in table.columns.iter().enumerate() {
        sheet.write_string_with_format(0, c as u16, name, header)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let r = r as u32 + 1;
        for (c, value) in row.iter().enumerate() {
            let c = c as u16;
            match value {
                _ if value.is_missing() => {}
                Value::Int(n) => {
                    sheet.write_number(r, c, *n as f64)?;
                }
                Value::Float(f) => {
                    sheet.write_number(r, c, *f)?;
                }
                Value::Bool(b) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                Value::Text(s) => {
                    sheet.write_string(r, c, s)?;
                }
                Value::Missing => {}
            }
        }
    }
    Ok(())
}

/// Write summary and partitions as sheets of one workbook.
pub fn write_xlsx_report(path: &Path, result: &ReconResult) -> Result<(), String> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheets = [
        ("Summary", summary_table(result)),
        ("Authority_Only", result.authority_only.clone()),
        ("Counterpart_Only", result.counterpart_only.clone()),
        ("Mismatched", result.mismatched_table()),
    ];
    for (name, table) in &sheets {
        let sheet = workbook
            .add_worksheet()
            .set_name(*name)
            .map_err(|e| format!("Failed to create sheet '{name}': {e}"))?;
        write_sheet(sheet, table, &header).map_err(|e| format!("Failed to write sheet '{name}': {e}"))?;
    }

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {e}"))
}
