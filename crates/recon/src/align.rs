use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::keys::KeyFields;
use crate::model::{Table, Value, AUTHORITY_MERGED};

/// Column-name prefix for authority fields that have no counterpart equivalent.
pub const AUTHORITY_ONLY_PREFIX: &str = "authority_only_";

// ---------------------------------------------------------------------------
// Mapping table
// ---------------------------------------------------------------------------

/// One row of the mapping table. A missing or empty `counterpart` marks an
/// authority-only field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub authority: String,
    #[serde(default)]
    pub counterpart: Option<String>,
}

impl FieldMapping {
    pub fn mapped(authority: impl Into<String>, counterpart: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            counterpart: Some(counterpart.into()),
        }
    }

    pub fn authority_only(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            counterpart: None,
        }
    }

    pub fn counterpart_field(&self) -> Option<&str> {
        self.counterpart.as_deref().filter(|c| !c.is_empty())
    }
}

/// A compared (authority, counterpart) field pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedField {
    pub authority: String,
    pub counterpart: String,
}

/// Immutable, validated mapping for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: Vec<FieldMapping>,
}

impl MappingTable {
    /// Rejects an authority field listed twice. Empty counterpart names are
    /// normalized to `None`.
    pub fn new(entries: Vec<FieldMapping>) -> Result<Self, ReconError> {
        let mut seen = HashSet::with_capacity(entries.len());
        let mut normalized = Vec::with_capacity(entries.len());
        for entry in entries {
            if !seen.insert(entry.authority.clone()) {
                return Err(ReconError::DuplicateMapping { field: entry.authority });
            }
            let counterpart = entry.counterpart_field().map(str::to_string);
            normalized.push(FieldMapping {
                authority: entry.authority,
                counterpart,
            });
        }
        Ok(Self { entries: normalized })
    }

    pub fn entries(&self) -> &[FieldMapping] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<FieldMapping> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mapped_fields(&self) -> Vec<MappedField> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.counterpart_field().map(|c| MappedField {
                    authority: e.authority.clone(),
                    counterpart: c.to_string(),
                })
            })
            .collect()
    }

    pub fn authority_only_fields(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.counterpart_field().is_none())
            .map(|e| e.authority.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// The merged authority dataset reshaped into counterpart naming.
///
/// Rows correspond one-to-one, in order, with the merged dataset's rows.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedAuthority {
    pub table: Table,
    pub mapped_fields: Vec<MappedField>,
    pub authority_only_fields: Vec<String>,
}

/// Rename the merged authority columns per `mapping`.
///
/// Output columns: identity (under the counterpart identity name), grouping,
/// then one column per mapping entry in mapping order. Mapped fields take the
/// counterpart name; authority-only fields take [`AUTHORITY_ONLY_PREFIX`].
pub fn align(merged: &Table, mapping: &MappingTable, keys: &KeyFields) -> Result<AlignedAuthority, ReconError> {
    let identity = merged
        .column_index(&keys.authority_identity)
        .ok_or_else(|| ReconError::schema(AUTHORITY_MERGED, &keys.authority_identity, &merged.columns))?;
    let grouping = merged
        .column_index(&keys.grouping)
        .ok_or_else(|| ReconError::schema(AUTHORITY_MERGED, &keys.grouping, &merged.columns))?;

    // Output column name → source column index in `merged`.
    let mut columns: Vec<String> = Vec::new();
    let mut sources: Vec<usize> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut set_by_mapping: HashSet<String> = HashSet::new();

    let mut place = |name: String, source: usize, columns: &mut Vec<String>, sources: &mut Vec<usize>| {
        match position.get(&name) {
            Some(&at) => sources[at] = source,
            None => {
                position.insert(name.clone(), columns.len());
                columns.push(name);
                sources.push(source);
            }
        }
    };

    place(keys.counterpart_identity.clone(), identity, &mut columns, &mut sources);
    place(keys.grouping.clone(), grouping, &mut columns, &mut sources);

    for entry in mapping.entries() {
        let source = merged.column_index(&entry.authority).ok_or_else(|| ReconError::Mapping {
            field: entry.authority.clone(),
            dataset: AUTHORITY_MERGED.into(),
        })?;
        let name = match entry.counterpart_field() {
            Some(counterpart) => {
                if !set_by_mapping.insert(counterpart.to_string()) {
                    log::warn!(
                        "counterpart field '{counterpart}' is mapped more than once; '{}' supplies the aligned column",
                        entry.authority
                    );
                }
                counterpart.to_string()
            }
            None => format!("{AUTHORITY_ONLY_PREFIX}{}", entry.authority),
        };
        place(name, source, &mut columns, &mut sources);
    }

    let mut table = Table::new(columns);
    for row in &merged.rows {
        table.push_row(
            sources
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or(Value::Missing))
                .collect(),
        );
    }

    let mapped_fields = mapping.mapped_fields();
    let authority_only_fields = mapping.authority_only_fields();
    log::info!(
        "aligned authority dataset: {} mapped fields, {} authority-only fields",
        mapped_fields.len(),
        authority_only_fields.len()
    );

    Ok(AlignedAuthority {
        table,
        mapped_fields,
        authority_only_fields,
    })
}
