use std::collections::{BTreeSet, HashSet};

use crate::align::MappedField;
use crate::keys::CompositeKey;
use crate::model::{FieldDiff, Table, Value};

pub const ACTION_COLUMN: &str = "action";

/// Missing equals only missing; present values compare by canonical form.
pub fn values_match(authority: &Value, counterpart: &Value) -> bool {
    authority.canonical() == counterpart.canonical()
}

#[derive(Debug, Clone)]
struct ComparedPair {
    field: MappedField,
    authority: usize,
    counterpart: usize,
}

/// Mapped pairs resolved to column positions, once per run.
#[derive(Debug, Clone, Default)]
pub struct ComparePlan {
    pairs: Vec<ComparedPair>,
    /// Pairs whose counterpart field is absent from the counterpart schema.
    pub skipped: Vec<MappedField>,
    /// Pairs named in the exclusion list.
    pub excluded: Vec<MappedField>,
}

impl ComparePlan {
    pub fn new(
        authority: &Table,
        counterpart: &Table,
        mapped: &[MappedField],
        exclude: &BTreeSet<String>,
    ) -> Self {
        let mut plan = Self::default();
        for field in mapped {
            if exclude.contains(&field.counterpart) || exclude.contains(&field.authority) {
                plan.excluded.push(field.clone());
                continue;
            }
            match (
                authority.column_index(&field.authority),
                counterpart.column_index(&field.counterpart),
            ) {
                (Some(a), Some(c)) => plan.pairs.push(ComparedPair {
                    field: field.clone(),
                    authority: a,
                    counterpart: c,
                }),
                _ => {
                    log::warn!(
                        "mapped field '{}' → '{}' is absent on one side; not compared",
                        field.authority,
                        field.counterpart
                    );
                    plan.skipped.push(field.clone());
                }
            }
        }
        plan
    }

    pub fn compared(&self) -> impl Iterator<Item = &MappedField> {
        self.pairs.iter().map(|p| &p.field)
    }

    /// Differing mapped fields between two representative rows.
    pub fn diff(&self, authority_row: &[Value], counterpart_row: &[Value]) -> Vec<FieldDiff> {
        let missing = Value::Missing;
        self.pairs
            .iter()
            .filter_map(|p| {
                let a = authority_row.get(p.authority).unwrap_or(&missing);
                let c = counterpart_row.get(p.counterpart).unwrap_or(&missing);
                (!values_match(a, c)).then(|| FieldDiff {
                    authority_field: p.field.authority.clone(),
                    counterpart_field: p.field.counterpart.clone(),
                    authority_value: a.clone(),
                    counterpart_value: c.clone(),
                })
            })
            .collect()
    }
}

/// Rows whose key is in `wanted`, in input order, with an action annotation.
///
/// `keys` holds one key per row of `table`. An existing `action` column is
/// overwritten rather than duplicated.
pub fn select_rows(
    table: &Table,
    keys: &[CompositeKey],
    wanted: &HashSet<&CompositeKey>,
    action: &str,
) -> Table {
    let existing = table.column_index(ACTION_COLUMN);
    let mut columns = table.columns.clone();
    if existing.is_none() {
        columns.push(ACTION_COLUMN.into());
    }

    let mut out = Table::new(columns);
    for (row, key) in table.rows.iter().zip(keys) {
        if !wanted.contains(key) {
            continue;
        }
        let mut values = row.clone();
        values.resize(table.columns.len(), Value::Missing);
        match existing {
            Some(i) => values[i] = Value::text(action),
            None => values.push(Value::text(action)),
        }
        out.push_row(values);
    }
    out
}
