use std::collections::BTreeMap;

use serde::Serialize;

use crate::keys::KeyIndex;
use crate::matcher::KeyPartition;
use crate::model::FieldReport;

/// Summary counts of one run.
///
/// `authority_only` / `counterpart_only` count partition rows; `common` counts
/// distinct keys. Without intra-side duplicates the row and key counts agree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub authority_records: usize,
    pub counterpart_records: usize,
    pub authority_only: usize,
    pub counterpart_only: usize,
    pub common: usize,
    pub mismatched: usize,
    /// Authority rows whose key is common.
    pub common_authority_rows: usize,
    /// Counterpart rows whose key is common.
    pub common_counterpart_rows: usize,
    pub mapped_fields: usize,
    pub authority_only_fields: usize,
    pub skipped_fields: usize,
    pub total_action_required: usize,
}

impl Statistics {
    /// Every input row lands in exactly one partition on its side.
    pub fn is_balanced(&self) -> bool {
        self.authority_only + self.common_authority_rows == self.authority_records
            && self.counterpart_only + self.common_counterpart_rows == self.counterpart_records
    }

    /// Flat name → count view.
    pub fn as_map(&self) -> BTreeMap<&'static str, usize> {
        BTreeMap::from([
            ("authority_records", self.authority_records),
            ("counterpart_records", self.counterpart_records),
            ("authority_only", self.authority_only),
            ("counterpart_only", self.counterpart_only),
            ("common", self.common),
            ("mismatched", self.mismatched),
            ("common_authority_rows", self.common_authority_rows),
            ("common_counterpart_rows", self.common_counterpart_rows),
            ("mapped_fields", self.mapped_fields),
            ("authority_only_fields", self.authority_only_fields),
            ("skipped_fields", self.skipped_fields),
            ("total_action_required", self.total_action_required),
        ])
    }
}

/// Compute summary statistics from the key partition.
pub fn compute_statistics(
    authority: &KeyIndex,
    counterpart: &KeyIndex,
    partition: &KeyPartition,
    mismatched: usize,
    fields: &FieldReport,
) -> Statistics {
    let authority_only: usize = partition.authority_only.iter().map(|k| authority.count(k)).sum();
    let counterpart_only: usize = partition.counterpart_only.iter().map(|k| counterpart.count(k)).sum();
    let common_authority_rows = partition.common.iter().map(|k| authority.count(k)).sum();
    let common_counterpart_rows = partition.common.iter().map(|k| counterpart.count(k)).sum();

    Statistics {
        authority_records: authority.rows(),
        counterpart_records: counterpart.rows(),
        authority_only,
        counterpart_only,
        common: partition.common.len(),
        mismatched,
        common_authority_rows,
        common_counterpart_rows,
        mapped_fields: fields.mapped.len(),
        authority_only_fields: fields.authority_only.len(),
        skipped_fields: fields.skipped.len(),
        total_action_required: authority_only + counterpart_only + mismatched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::CompositeKey;
    use crate::matcher::partition_keys;

    fn index(keys: &[&str]) -> KeyIndex {
        KeyIndex::new(keys.iter().map(|&k| CompositeKey::from(k)).collect())
    }

    #[test]
    fn summary_counts() {
        let a = index(&["A|X", "B|X", "C|Y"]);
        let c = index(&["A|X", "C|Y", "D|Z", "E|Z"]);
        let p = partition_keys(&a, &c);
        let s = compute_statistics(&a, &c, &p, 1, &FieldReport::default());
        assert_eq!(s.authority_records, 3);
        assert_eq!(s.counterpart_records, 4);
        assert_eq!(s.authority_only, 1);
        assert_eq!(s.counterpart_only, 2);
        assert_eq!(s.common, 2);
        assert_eq!(s.mismatched, 1);
        assert_eq!(s.total_action_required, 4);
        assert!(s.is_balanced());
    }

    #[test]
    fn duplicates_keep_identity_in_row_terms() {
        let a = index(&["A|X", "A|X", "B|X"]);
        let c = index(&["A|X"]);
        let p = partition_keys(&a, &c);
        let s = compute_statistics(&a, &c, &p, 0, &FieldReport::default());
        assert_eq!(s.common, 1);
        assert_eq!(s.common_authority_rows, 2);
        assert_eq!(s.authority_only, 1);
        assert!(s.is_balanced());
    }

    #[test]
    fn map_view_names_every_count() {
        let s = Statistics { mismatched: 3, ..Statistics::default() };
        let m = s.as_map();
        assert_eq!(m["mismatched"], 3);
        assert_eq!(m.len(), 12);
    }
}
