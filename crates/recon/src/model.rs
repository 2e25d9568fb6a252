use std::fmt;

use serde::{Serialize, Serializer};

use crate::align::MappedField;
use crate::audit::IntegrityReport;
use crate::keys::{CompositeKey, KeyFields};
use crate::summary::Statistics;

/// Dataset names used in errors, logs and the integrity report.
pub const AUTHORITY_PRIMARY: &str = "authority_primary";
pub const AUTHORITY_RULES: &str = "authority_rules";
pub const AUTHORITY_MERGED: &str = "authority";
pub const COUNTERPART: &str = "counterpart";

/// Text substituted for a missing value wherever a value must become text.
pub const MISSING_TEXT: &str = "nan";

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// One cell of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Absent, null, or a not-a-number float.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Textual coercion for keys and join values. Missing becomes `"nan"`.
    pub fn key_text(&self) -> String {
        if self.is_missing() {
            return MISSING_TEXT.into();
        }
        match self {
            Self::Text(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.1}"),
            Self::Float(f) => f.to_string(),
            Self::Bool(true) => "True".into(),
            Self::Bool(false) => "False".into(),
            Self::Missing => MISSING_TEXT.into(),
        }
    }

    /// Cell text for tabular output. Missing renders empty.
    pub fn to_cell(&self) -> String {
        if self.is_missing() {
            String::new()
        } else {
            self.key_text()
        }
    }

    /// Comparison form. `None` for missing values.
    ///
    /// Boolean spellings (`TRUE/YES/Y/1`, `FALSE/NO/N/0`) collapse to
    /// `true`/`false`, integral floats render as integers, and everything else
    /// compares by lowercased text.
    pub fn canonical(&self) -> Option<String> {
        let text = match self {
            _ if self.is_missing() => return None,
            Self::Text(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Missing => return None,
        };
        match text.trim().to_ascii_uppercase().as_str() {
            "TRUE" | "YES" | "Y" | "1" => Some("true".into()),
            "FALSE" | "NO" | "N" | "0" => Some("false".into()),
            _ => Some(text.to_lowercase()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_text())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            _ if self.is_missing() => serializer.serialize_none(),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Missing => serializer.serialize_none(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Missing)
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// An in-memory dataset: ordered column names plus rows of values.
///
/// Headers are expected to be normalized already (see `load::normalize_header`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Build a table from borrowed headers and rows. Rows are padded or
    /// truncated to the column count.
    pub fn with_rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let mut table = Self::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Missing);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    pub fn record(&self, row: usize) -> Option<Record<'_>> {
        self.rows.get(row).map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            columns: &self.columns,
            values,
        })
    }
}

/// One row viewed as an ordered field → value mapping.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        let idx = self.columns.iter().position(|c| c == field)?;
        self.values.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn is_empty_row(&self) -> bool {
        self.values.iter().all(Value::is_missing)
    }
}

// ---------------------------------------------------------------------------
// Mismatches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub authority_field: String,
    pub counterpart_field: String,
    pub authority_value: Value,
    pub counterpart_value: Value,
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (authority: {}, counterpart: {})",
            self.counterpart_field, self.authority_value, self.counterpart_value
        )
    }
}

/// A common key whose representative rows differ on at least one mapped field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub key: CompositeKey,
    pub identity: Value,
    pub grouping: Value,
    pub fields: Vec<FieldDiff>,
    pub action: String,
}

impl Mismatch {
    pub fn describe_fields(&self) -> String {
        self.fields
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// How the mapping table played out against the loaded schemas.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldReport {
    /// Pairs compared across sides.
    pub mapped: Vec<MappedField>,
    /// Authority fields carried through under the authority-only prefix.
    pub authority_only: Vec<String>,
    /// Mapped pairs whose counterpart field is absent from the counterpart schema.
    pub skipped: Vec<MappedField>,
    /// Mapped pairs excluded from comparison by configuration.
    pub excluded: Vec<MappedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconResult {
    pub key_fields: KeyFields,
    /// Aligned authority rows whose key is absent on the counterpart side.
    pub authority_only: Table,
    /// Counterpart rows whose key is absent on the authority side.
    pub counterpart_only: Table,
    /// Keys present on both sides, in authority input order.
    pub common: Vec<CompositeKey>,
    /// Subset of `common` with at least one differing mapped field.
    pub mismatched: Vec<Mismatch>,
    pub fields: FieldReport,
    pub statistics: Statistics,
    pub integrity: IntegrityReport,
}

impl ReconResult {
    /// Flattened view of `mismatched` for tabular export.
    pub fn mismatched_table(&self) -> Table {
        let mut table = Table::new(vec![
            self.key_fields.counterpart_identity.clone(),
            self.key_fields.grouping.clone(),
            "mismatched_fields".into(),
            "action".into(),
        ]);
        for m in &self.mismatched {
            table.push_row(vec![
                m.identity.clone(),
                m.grouping.clone(),
                Value::Text(m.describe_fields()),
                Value::Text(m.action.clone()),
            ]);
        }
        table
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

/// A result plus the metadata of the run that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    pub meta: ReconMeta,
    #[serde(flatten)]
    pub result: ReconResult,
}
