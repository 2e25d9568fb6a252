use std::collections::{BTreeSet, HashSet};

use crate::align::{align, MappingTable};
use crate::audit::{dataset_counts, side_integrity, IntegrityReport};
use crate::classify::{select_rows, ComparePlan};
use crate::config::{Actions, DuplicateKeyPolicy, ReconConfig};
use crate::error::ReconError;
use crate::keys::{build_keys, detect_identity_field, KeyFields, KeyIndex};
use crate::load::normalize_header;
use crate::matcher::partition_keys;
use crate::merge::merge_rules;
use crate::model::{
    FieldReport, Mismatch, ReconMeta, ReconReport, ReconResult, Table, Value, AUTHORITY_MERGED,
    AUTHORITY_PRIMARY, AUTHORITY_RULES, COUNTERPART,
};
use crate::summary::compute_statistics;

/// Knobs that do not change the partition semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconOptions {
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Field names (either side) never compared.
    pub exclude: BTreeSet<String>,
    pub actions: Actions,
}

/// Pre-loaded inputs of one run.
#[derive(Debug, Clone)]
pub struct ReconInput {
    pub authority_primary: Table,
    pub authority_rules: Table,
    pub counterpart: Table,
    pub mapping: MappingTable,
}

/// Reconcile with default options.
pub fn reconcile(
    authority_primary: &Table,
    authority_rules: &Table,
    counterpart: &Table,
    mapping: &MappingTable,
    keys: &KeyFields,
) -> Result<ReconResult, ReconError> {
    reconcile_with(
        authority_primary,
        authority_rules,
        counterpart,
        mapping,
        keys,
        &ReconOptions::default(),
    )
}

/// Merge, align, key, partition and compare. Deterministic for identical inputs.
///
/// Fatal errors abort before any partition is produced.
pub fn reconcile_with(
    authority_primary: &Table,
    authority_rules: &Table,
    counterpart: &Table,
    mapping: &MappingTable,
    keys: &KeyFields,
    options: &ReconOptions,
) -> Result<ReconResult, ReconError> {
    let merged = merge_rules(authority_primary, authority_rules, &keys.grouping)?;
    let aligned = align(&merged, mapping, keys)?;

    let authority_keys = KeyIndex::new(build_keys(
        &merged,
        &keys.authority_identity,
        &keys.grouping,
        AUTHORITY_MERGED,
    )?);
    let counterpart_keys = KeyIndex::new(build_keys(
        counterpart,
        &keys.counterpart_identity,
        &keys.grouping,
        COUNTERPART,
    )?);

    for (dataset, index) in [(AUTHORITY_MERGED, &authority_keys), (COUNTERPART, &counterpart_keys)] {
        let duplicates = index.duplicates();
        let Some((key, rows)) = duplicates.first() else {
            continue;
        };
        match options.duplicate_keys {
            DuplicateKeyPolicy::Reject => {
                return Err(ReconError::DuplicateKey {
                    dataset: dataset.into(),
                    key: key.to_string(),
                    rows: *rows,
                });
            }
            DuplicateKeyPolicy::FirstOccurrence => log::warn!(
                "{dataset}: {} keys appear on more than one row; comparing first occurrences",
                duplicates.len()
            ),
        }
    }

    let partition = partition_keys(&authority_keys, &counterpart_keys);
    log::info!(
        "partitioned keys: {} authority-only, {} counterpart-only, {} common",
        partition.authority_only.len(),
        partition.counterpart_only.len(),
        partition.common.len()
    );

    let authority_only = select_rows(
        &aligned.table,
        authority_keys.keys(),
        &partition.authority_only.iter().collect::<HashSet<_>>(),
        &options.actions.authority_only,
    );
    let counterpart_only = select_rows(
        counterpart,
        counterpart_keys.keys(),
        &partition.counterpart_only.iter().collect::<HashSet<_>>(),
        &options.actions.counterpart_only,
    );

    let plan = ComparePlan::new(&merged, counterpart, &aligned.mapped_fields, &options.exclude);
    let mut mismatched = Vec::new();
    for key in &partition.common {
        let (Some(a), Some(c)) = (authority_keys.first_row(key), counterpart_keys.first_row(key)) else {
            continue;
        };
        let fields = plan.diff(&merged.rows[a], &counterpart.rows[c]);
        if fields.is_empty() {
            continue;
        }
        log::debug!("{key}: {} fields differ", fields.len());
        let cell = |column: &str| aligned.table.get(a, column).cloned().unwrap_or(Value::Missing);
        mismatched.push(Mismatch {
            key: key.clone(),
            identity: cell(&keys.counterpart_identity),
            grouping: cell(&keys.grouping),
            fields,
            action: options.actions.mismatched.clone(),
        });
    }
    log::info!("{} of {} common keys mismatched", mismatched.len(), partition.common.len());

    let fields = FieldReport {
        mapped: plan.compared().cloned().collect(),
        authority_only: aligned.authority_only_fields.clone(),
        skipped: plan.skipped.clone(),
        excluded: plan.excluded.clone(),
    };

    let statistics = compute_statistics(
        &authority_keys,
        &counterpart_keys,
        &partition,
        mismatched.len(),
        &fields,
    );
    debug_assert!(statistics.is_balanced());

    let integrity = IntegrityReport {
        datasets: vec![
            dataset_counts(AUTHORITY_PRIMARY, authority_primary),
            dataset_counts(AUTHORITY_RULES, authority_rules),
            dataset_counts(COUNTERPART, counterpart),
        ],
        merge_preserved_rows: merged.len() == authority_primary.len(),
        authority: side_integrity(&merged, &authority_keys, &keys.authority_identity, &keys.grouping),
        counterpart: side_integrity(counterpart, &counterpart_keys, &keys.counterpart_identity, &keys.grouping),
    };
    for (dataset, side) in [(AUTHORITY_MERGED, &integrity.authority), (COUNTERPART, &integrity.counterpart)] {
        if side.sentinel_keys > 0 {
            log::warn!("{dataset}: {} rows have a missing identity or grouping value", side.sentinel_keys);
        }
        if side.padded_identities > 0 {
            log::warn!("{dataset}: {} identity values carry surrounding whitespace", side.padded_identities);
        }
    }

    Ok(ReconResult {
        key_fields: keys.clone(),
        authority_only,
        counterpart_only,
        common: partition.common,
        mismatched,
        fields,
        statistics,
        integrity,
    })
}

/// Resolve key fields from config, detecting identity columns it leaves out.
pub fn resolve_keys(config: &ReconConfig, input: &ReconInput) -> Result<KeyFields, ReconError> {
    let authority_identity = match &config.keys.identity {
        Some(field) => normalize_header(field),
        None => detect_identity_field(&input.authority_primary, AUTHORITY_PRIMARY)?,
    };
    let counterpart_identity = match (&config.keys.counterpart_identity, &config.keys.identity) {
        (Some(field), _) | (None, Some(field)) => normalize_header(field),
        (None, None) => detect_identity_field(&input.counterpart, COUNTERPART)?,
    };
    Ok(KeyFields::new(authority_identity, normalize_header(&config.keys.grouping))
        .with_counterpart_identity(counterpart_identity))
}

/// Run reconciliation per config. Returns the result plus run metadata.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconReport, ReconError> {
    let keys = resolve_keys(config, input)?;
    log::info!(
        "reconciling '{}' on {} / {} + {}",
        config.name,
        keys.authority_identity,
        keys.counterpart_identity,
        keys.grouping
    );

    let options = ReconOptions {
        duplicate_keys: config.compare.duplicate_keys,
        exclude: config.exclude_set(),
        actions: config.actions.clone(),
    };
    let result = reconcile_with(
        &input.authority_primary,
        &input.authority_rules,
        &input.counterpart,
        &input.mapping,
        &keys,
        &options,
    )?;

    Ok(ReconReport {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        result,
    })
}
