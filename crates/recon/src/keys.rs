use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::{Table, Value};

pub const KEY_SEPARATOR: char = '|';

/// Column names probed, in order, when no identity field is configured.
pub const IDENTITY_CANDIDATES: [&str; 6] =
    ["symbol", "security_id", "isin", "cusip", "identifier", "secid"];

pub const DEFAULT_GROUPING_FIELD: &str = "exchange";

/// `identity|grouping` over the textual coercion of both values.
///
/// Never trimmed or case-folded: `"AAPL"` and `"aapl "` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CompositeKey {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

/// Which columns identify a record on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFields {
    pub authority_identity: String,
    pub counterpart_identity: String,
    pub grouping: String,
}

impl KeyFields {
    /// Same identity column name on both sides.
    pub fn new(identity: impl Into<String>, grouping: impl Into<String>) -> Self {
        let identity = identity.into();
        Self {
            counterpart_identity: identity.clone(),
            authority_identity: identity,
            grouping: grouping.into(),
        }
    }

    pub fn with_counterpart_identity(mut self, identity: impl Into<String>) -> Self {
        self.counterpart_identity = identity.into();
        self
    }
}

pub fn composite_key(identity: &Value, grouping: &Value) -> CompositeKey {
    let identity = identity.key_text();
    let grouping = grouping.key_text();
    let mut key = String::with_capacity(identity.len() + grouping.len() + 1);
    key.push_str(&identity);
    key.push(KEY_SEPARATOR);
    key.push_str(&grouping);
    CompositeKey(key)
}

/// One key per row, in row order.
///
/// The schema is checked once up front; empty values never fail.
pub fn build_keys(
    table: &Table,
    identity_field: &str,
    grouping_field: &str,
    dataset: &str,
) -> Result<Vec<CompositeKey>, ReconError> {
    let identity_idx = table
        .column_index(identity_field)
        .ok_or_else(|| ReconError::schema(dataset, identity_field, &table.columns))?;
    let grouping_idx = table
        .column_index(grouping_field)
        .ok_or_else(|| ReconError::schema(dataset, grouping_field, &table.columns))?;

    Ok(table
        .rows
        .iter()
        .map(|row| {
            let missing = Value::Missing;
            composite_key(
                row.get(identity_idx).unwrap_or(&missing),
                row.get(grouping_idx).unwrap_or(&missing),
            )
        })
        .collect())
}

/// First column among [`IDENTITY_CANDIDATES`] present in the table.
pub fn detect_identity_field(table: &Table, dataset: &str) -> Result<String, ReconError> {
    IDENTITY_CANDIDATES
        .iter()
        .find(|c| table.has_column(c))
        .map(|c| c.to_string())
        .ok_or_else(|| ReconError::schema(dataset, &IDENTITY_CANDIDATES.join("|"), &table.columns))
}

// ---------------------------------------------------------------------------
// Key index
// ---------------------------------------------------------------------------

/// Per-row keys of one side plus lookup by key.
///
/// Duplicate keys are kept: every row is still counted, and `first_row`
/// resolves a key to its earliest row in input order.
#[derive(Debug, Clone)]
pub struct KeyIndex {
    keys: Vec<CompositeKey>,
    distinct: Vec<CompositeKey>,
    first_row: HashMap<CompositeKey, usize>,
    counts: HashMap<CompositeKey, usize>,
}

impl KeyIndex {
    pub fn new(keys: Vec<CompositeKey>) -> Self {
        let mut distinct = Vec::new();
        let mut first_row = HashMap::with_capacity(keys.len());
        let mut counts: HashMap<CompositeKey, usize> = HashMap::with_capacity(keys.len());

        for (row, key) in keys.iter().enumerate() {
            *counts.entry(key.clone()).or_insert(0) += 1;
            if !first_row.contains_key(key) {
                first_row.insert(key.clone(), row);
                distinct.push(key.clone());
            }
        }

        Self { keys, distinct, first_row, counts }
    }

    /// Keys in row order, one per row.
    pub fn keys(&self) -> &[CompositeKey] {
        &self.keys
    }

    /// Distinct keys in first-appearance order.
    pub fn distinct(&self) -> &[CompositeKey] {
        &self.distinct
    }

    pub fn rows(&self) -> usize {
        self.keys.len()
    }

    pub fn contains(&self, key: &CompositeKey) -> bool {
        self.first_row.contains_key(key)
    }

    pub fn first_row(&self, key: &CompositeKey) -> Option<usize> {
        self.first_row.get(key).copied()
    }

    pub fn count(&self, key: &CompositeKey) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Keys carried by more than one row, with their row counts.
    pub fn duplicates(&self) -> Vec<(CompositeKey, usize)> {
        self.distinct
            .iter()
            .filter_map(|k| {
                let n = self.count(k);
                (n > 1).then(|| (k.clone(), n))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: Vec<Vec<Value>>) -> Table {
        Table::with_rows(&["symbol", "exchange", "min_order"], rows)
    }

    #[test]
    fn key_is_pipe_joined() {
        let k = composite_key(&"AAPL".into(), &"NASDAQ".into());
        assert_eq!(k.as_str(), "AAPL|NASDAQ");
    }

    #[test]
    fn missing_identity_uses_sentinel() {
        let k = composite_key(&Value::Missing, &"NASDAQ".into());
        assert_eq!(k.as_str(), "nan|NASDAQ");
        let k = composite_key(&"AAPL".into(), &Value::Float(f64::NAN));
        assert_eq!(k.as_str(), "AAPL|nan");
    }

    #[test]
    fn whitespace_and_case_are_significant() {
        let a = composite_key(&"AAPL".into(), &"NASDAQ".into());
        assert_ne!(a, composite_key(&"aapl".into(), &"NASDAQ".into()));
        assert_ne!(a, composite_key(&"AAPL ".into(), &"NASDAQ".into()));
    }

    #[test]
    fn build_keys_per_row() {
        let t = table(vec![
            vec!["AAPL".into(), "NASDAQ".into(), 100i64.into()],
            vec![Value::Missing, "NYSE".into(), 5i64.into()],
        ]);
        let keys = build_keys(&t, "symbol", "exchange", "counterpart").unwrap();
        assert_eq!(keys, vec![CompositeKey::from("AAPL|NASDAQ"), CompositeKey::from("nan|NYSE")]);
    }

    #[test]
    fn build_keys_requires_schema() {
        let t = Table::with_rows(&["symbol"], vec![vec!["AAPL".into()]]);
        let err = build_keys(&t, "symbol", "exchange", "counterpart").unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
        assert!(err.to_string().contains("'exchange'"));
    }

    #[test]
    fn build_keys_on_empty_table_checks_schema_only() {
        let t = Table::new(vec!["symbol".into(), "exchange".into()]);
        assert!(build_keys(&t, "symbol", "exchange", "counterpart").unwrap().is_empty());
    }

    #[test]
    fn detect_identity_prefers_candidate_order() {
        let t = Table::new(vec!["isin".into(), "symbol".into(), "exchange".into()]);
        assert_eq!(detect_identity_field(&t, "x").unwrap(), "symbol");

        let t = Table::new(vec!["ticker".into(), "exchange".into()]);
        assert_eq!(detect_identity_field(&t, "x").unwrap_err().kind(), "SchemaError");
    }

    #[test]
    fn index_tracks_duplicates_and_first_row() {
        let idx = KeyIndex::new(vec!["A|X".into(), "B|X".into(), "A|X".into()]);
        assert_eq!(idx.rows(), 3);
        assert_eq!(idx.distinct().len(), 2);
        assert_eq!(idx.first_row(&"A|X".into()), Some(0));
        assert_eq!(idx.count(&"A|X".into()), 2);
        assert_eq!(idx.duplicates(), vec![(CompositeKey::from("A|X"), 2)]);
        assert!(!idx.contains(&"C|X".into()));
    }
}
