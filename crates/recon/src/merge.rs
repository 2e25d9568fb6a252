use std::collections::{HashMap, HashSet};

use crate::error::ReconError;
use crate::model::{Table, Value, AUTHORITY_PRIMARY, AUTHORITY_RULES};

/// Suffixes for non-key columns present on both sides of the join.
pub const PRIMARY_SUFFIX: &str = "_x";
pub const RULE_SUFFIX: &str = "_y";

/// Left-join the primary security set with the rule set on `grouping`.
///
/// Every primary row survives exactly once; primary rows without a rule get
/// missing values for the rule columns. The rule set may hold at most one row
/// per grouping value. A rule table without any columns contributes nothing.
pub fn merge_rules(primary: &Table, rules: &Table, grouping: &str) -> Result<Table, ReconError> {
    let primary_key = primary
        .column_index(grouping)
        .ok_or_else(|| ReconError::schema(AUTHORITY_PRIMARY, grouping, &primary.columns))?;

    if rules.columns.is_empty() {
        log::debug!("rule dataset has no columns; authority dataset is the primary set");
        return Ok(primary.clone());
    }

    let rule_key = rules
        .column_index(grouping)
        .ok_or_else(|| ReconError::schema(AUTHORITY_RULES, grouping, &rules.columns))?;

    let rule_by_group = index_rules(rules, rule_key, grouping)?;

    let rule_cols: Vec<usize> = (0..rules.columns.len()).filter(|&i| i != rule_key).collect();
    let primary_names: HashSet<&str> = primary.columns.iter().map(String::as_str).collect();
    let rule_names: HashSet<&str> = rule_cols.iter().map(|&i| rules.columns[i].as_str()).collect();

    let mut columns = Vec::with_capacity(primary.columns.len() + rule_cols.len());
    for (i, name) in primary.columns.iter().enumerate() {
        if i != primary_key && rule_names.contains(name.as_str()) {
            columns.push(format!("{name}{PRIMARY_SUFFIX}"));
        } else {
            columns.push(name.clone());
        }
    }
    for &i in &rule_cols {
        let name = &rules.columns[i];
        if primary_names.contains(name.as_str()) {
            columns.push(format!("{name}{RULE_SUFFIX}"));
        } else {
            columns.push(name.clone());
        }
    }

    let mut merged = Table::new(columns);
    let mut unmatched = 0usize;
    for row in &primary.rows {
        let group = row.get(primary_key).map(Value::key_text).unwrap_or_default();
        let mut out = row.clone();
        out.resize(primary.columns.len(), Value::Missing);
        match rule_by_group.get(group.as_str()) {
            Some(&r) => {
                let rule_row = &rules.rows[r];
                out.extend(
                    rule_cols
                        .iter()
                        .map(|&i| rule_row.get(i).cloned().unwrap_or(Value::Missing)),
                );
            }
            None => {
                unmatched += 1;
                out.extend(std::iter::repeat(Value::Missing).take(rule_cols.len()));
            }
        }
        merged.push_row(out);
    }

    if unmatched > 0 {
        log::info!("{unmatched} primary rows have no rule for their {grouping}");
    }
    debug_assert_eq!(merged.len(), primary.len());
    Ok(merged)
}

/// Map grouping value → rule row, rejecting repeated grouping values.
fn index_rules(
    rules: &Table,
    rule_key: usize,
    grouping: &str,
) -> Result<HashMap<String, usize>, ReconError> {
    let mut by_group: HashMap<String, usize> = HashMap::with_capacity(rules.len());
    for (r, row) in rules.rows.iter().enumerate() {
        let group = row.get(rule_key).map(Value::key_text).unwrap_or_default();
        if by_group.contains_key(&group) {
            let rows = rules
                .rows
                .iter()
                .filter(|other| other.get(rule_key).map(Value::key_text).as_deref() == Some(group.as_str()))
                .count();
            return Err(ReconError::Cardinality {
                dataset: AUTHORITY_RULES.into(),
                field: grouping.into(),
                value: group,
                rows,
            });
        }
        by_group.insert(group, r);
    }
    Ok(by_group)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary() -> Table {
        Table::with_rows(
            &["symbol", "exchange", "security_name"],
            vec![
                vec!["A".into(), "X".into(), "s1".into()],
                vec!["B".into(), "Y".into(), "s2".into()],
                vec!["C".into(), "Z".into(), "s3".into()],
            ],
        )
    }

    #[test]
    fn left_join_keeps_every_primary_row() {
        let rules = Table::with_rows(
            &["exchange", "minimum_order_value"],
            vec![vec!["X".into(), 100i64.into()], vec!["Y".into(), 200i64.into()]],
        );
        let merged = merge_rules(&primary(), &rules, "exchange").unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(
            merged.columns,
            vec!["symbol", "exchange", "security_name", "minimum_order_value"]
        );
        assert_eq!(merged.get(0, "minimum_order_value"), Some(&Value::Int(100)));
        assert_eq!(merged.get(1, "minimum_order_value"), Some(&Value::Int(200)));
        assert_eq!(merged.get(2, "minimum_order_value"), Some(&Value::Missing));
    }

    #[test]
    fn duplicate_rule_rows_are_fatal() {
        let rules = Table::with_rows(
            &["exchange", "minimum_order_value"],
            vec![
                vec!["X".into(), 100i64.into()],
                vec!["X".into(), 150i64.into()],
                vec!["Y".into(), 200i64.into()],
            ],
        );
        let err = merge_rules(&primary(), &rules, "exchange").unwrap_err();
        assert_eq!(
            err,
            ReconError::Cardinality {
                dataset: AUTHORITY_RULES.into(),
                field: "exchange".into(),
                value: "X".into(),
                rows: 2,
            }
        );
    }

    #[test]
    fn colliding_columns_get_suffixes() {
        let primary = Table::with_rows(
            &["symbol", "exchange", "mic_code"],
            vec![vec!["A".into(), "X".into(), "XNAS".into()]],
        );
        let rules = Table::with_rows(
            &["mic_code", "exchange"],
            vec![vec!["XNYS".into(), "X".into()]],
        );
        let merged = merge_rules(&primary, &rules, "exchange").unwrap();
        assert_eq!(merged.columns, vec!["symbol", "exchange", "mic_code_x", "mic_code_y"]);
        assert_eq!(merged.get(0, "mic_code_y"), Some(&Value::text("XNYS")));
    }

    #[test]
    fn empty_rule_table_is_accepted() {
        let merged = merge_rules(&primary(), &Table::default(), "exchange").unwrap();
        assert_eq!(merged, primary());

        let headers_only = Table::new(vec!["exchange".into(), "minimum_order_value".into()]);
        let merged = merge_rules(&primary(), &headers_only, "exchange").unwrap();
        assert_eq!(merged.len(), 3);
        assert!(merged.rows.iter().all(|r| r[3] == Value::Missing));
    }

    #[test]
    fn missing_grouping_column_is_schema_error() {
        let rules = Table::with_rows(&["venue", "lot"], vec![vec!["X".into(), 1i64.into()]]);
        let err = merge_rules(&primary(), &rules, "exchange").unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
        assert!(err.to_string().contains(AUTHORITY_RULES));

        let err = merge_rules(&Table::new(vec!["symbol".into()]), &rules, "exchange").unwrap_err();
        assert!(err.to_string().contains(AUTHORITY_PRIMARY));
    }

    #[test]
    fn missing_grouping_values_join_each_other() {
        let primary = Table::with_rows(&["symbol", "exchange"], vec![vec!["A".into(), Value::Missing]]);
        let rules = Table::with_rows(&["exchange", "lot"], vec![vec![Value::Missing, 10i64.into()]]);
        let merged = merge_rules(&primary, &rules, "exchange").unwrap();
        assert_eq!(merged.get(0, "lot"), Some(&Value::Int(10)));
    }
}
