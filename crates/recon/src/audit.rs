//! Data-integrity checks computed alongside every run.
//!
//! Nothing here is fatal: the report surfaces rows that will still be
//! reconciled but probably deserve a second look.

use serde::Serialize;

use crate::keys::{CompositeKey, KeyIndex};
use crate::model::Table;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetCounts {
    pub dataset: String,
    pub rows: usize,
    pub empty_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub key: CompositeKey,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SideIntegrity {
    /// Rows whose identity or grouping value was missing.
    pub sentinel_keys: usize,
    /// Identity values with leading or trailing whitespace.
    pub padded_identities: usize,
    pub duplicate_keys: Vec<DuplicateKey>,
}

impl SideIntegrity {
    pub fn is_clean(&self) -> bool {
        self.sentinel_keys == 0 && self.padded_identities == 0 && self.duplicate_keys.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub datasets: Vec<DatasetCounts>,
    /// Merged authority row count equals the primary row count. Always true
    /// once the rule cardinality check passed; reported, not judged.
    pub merge_preserved_rows: bool,
    pub authority: SideIntegrity,
    pub counterpart: SideIntegrity,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.datasets.iter().all(|d| d.empty_rows == 0)
            && self.authority.is_clean()
            && self.counterpart.is_clean()
    }
}

pub fn dataset_counts(dataset: &str, table: &Table) -> DatasetCounts {
    DatasetCounts {
        dataset: dataset.into(),
        rows: table.len(),
        empty_rows: table.records().filter(|r| r.is_empty_row()).count(),
    }
}

/// Integrity figures for one side. Fields absent from the table count as clean.
pub fn side_integrity(table: &Table, keys: &KeyIndex, identity: &str, grouping: &str) -> SideIntegrity {
    let identity_idx = table.column_index(identity);
    let grouping_idx = table.column_index(grouping);

    let mut sentinel_keys = 0;
    let mut padded_identities = 0;
    for row in &table.rows {
        let id = identity_idx.and_then(|i| row.get(i));
        let group = grouping_idx.and_then(|i| row.get(i));
        if id.map_or(false, |v| v.is_missing()) || group.map_or(false, |v| v.is_missing()) {
            sentinel_keys += 1;
        }
        if let Some(id) = id.filter(|v| !v.is_missing()) {
            let text = id.key_text();
            if text.trim() != text {
                padded_identities += 1;
            }
        }
    }

    let duplicate_keys = keys
        .duplicates()
        .into_iter()
        .map(|(key, rows)| DuplicateKey { key, rows })
        .collect();

    SideIntegrity {
        sentinel_keys,
        padded_identities,
        duplicate_keys,
    }
}
