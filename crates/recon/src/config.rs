use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::align::{FieldMapping, MappingTable};
use crate::error::ReconError;
use crate::keys::DEFAULT_GROUPING_FIELD;
use crate::load::normalize_header;

/// Bookkeeping columns never compared unless `[compare] exclude` says otherwise.
pub const DEFAULT_EXCLUDE: [&str; 6] = [
    "composite_key",
    "updated_date",
    "created_by",
    "institution",
    "updated_by",
    "last_updated",
];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    pub datasets: DatasetsConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub compare: CompareConfig,
    #[serde(default)]
    pub actions: Actions,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Datasets + keys
// ---------------------------------------------------------------------------

/// Input files. Relative paths resolve against the config file's directory.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetsConfig {
    pub authority_primary: String,
    pub authority_rules: String,
    pub counterpart: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_grouping")]
    pub grouping: String,
    /// Authority identity field. Detected from the data when omitted.
    #[serde(default)]
    pub identity: Option<String>,
    /// Counterpart identity field. Defaults to `identity`, then detection.
    #[serde(default)]
    pub counterpart_identity: Option<String>,
}

fn default_grouping() -> String {
    DEFAULT_GROUPING_FIELD.into()
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            grouping: default_grouping(),
            identity: None,
            counterpart_identity: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Mapping sources: a CSV file, inline entries, or both (file entries first).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingConfig {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
}

// ---------------------------------------------------------------------------
// Compare + actions
// ---------------------------------------------------------------------------

/// What to do when one side carries the same key on several rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Compare the first row in input order; report the rest.
    #[default]
    FirstOccurrence,
    /// Fail the run with `DuplicateKeyError`.
    Reject,
}

impl std::fmt::Display for DuplicateKeyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstOccurrence => write!(f, "first_occurrence"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompareConfig {
    #[serde(default)]
    pub duplicate_keys: DuplicateKeyPolicy,
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_exclude() -> Vec<String> {
    DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect()
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            duplicate_keys: DuplicateKeyPolicy::default(),
            exclude: default_exclude(),
        }
    }
}

/// Remediation text attached to each partition's rows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Actions {
    pub authority_only: String,
    pub counterpart_only: String,
    pub mismatched: String,
}

impl Default for Actions {
    fn default() -> Self {
        Self {
            authority_only: "ADD to counterpart whitelist".into(),
            counterpart_only: "REVIEW: check activity/positions - DELETE or ADD to exception list".into(),
            mismatched: "UPDATE counterpart to match authority and SETUP market exception rule".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// JSON result path.
    #[serde(default)]
    pub json: Option<String>,
    /// Directory for the per-partition CSV files.
    #[serde(default)]
    pub dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        for (label, path) in [
            ("authority_primary", &self.datasets.authority_primary),
            ("authority_rules", &self.datasets.authority_rules),
            ("counterpart", &self.datasets.counterpart),
        ] {
            if path.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "datasets.{label} must name a file"
                )));
            }
        }

        if self.keys.grouping.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "keys.grouping must not be empty".into(),
            ));
        }
        for (label, field) in [
            ("identity", &self.keys.identity),
            ("counterpart_identity", &self.keys.counterpart_identity),
        ] {
            if field.as_deref().is_some_and(|f| f.trim().is_empty()) {
                return Err(ReconError::ConfigValidation(format!(
                    "keys.{label} must not be empty when set"
                )));
            }
        }

        if self.mapping.file.is_none() && self.mapping.fields.is_empty() {
            return Err(ReconError::ConfigValidation(
                "mapping needs a file or at least one [[mapping.fields]] entry".into(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.mapping.fields {
            let field = normalize_header(&entry.authority);
            if field.is_empty() {
                return Err(ReconError::ConfigValidation(
                    "mapping.fields entry has an empty authority field".into(),
                ));
            }
            if !seen.insert(field.clone()) {
                return Err(ReconError::ConfigValidation(format!(
                    "mapping.fields lists authority field '{field}' more than once"
                )));
            }
        }

        Ok(())
    }

    /// Inline mapping entries with names normalized like dataset headers.
    pub fn inline_mapping(&self) -> Vec<FieldMapping> {
        self.mapping
            .fields
            .iter()
            .map(|e| FieldMapping {
                authority: normalize_header(&e.authority),
                counterpart: e.counterpart.as_deref().map(normalize_header),
            })
            .collect()
    }

    /// Combine file entries (loaded by the caller) with inline entries.
    pub fn mapping_table(&self, from_file: Vec<FieldMapping>) -> Result<MappingTable, ReconError> {
        let mut entries = from_file;
        entries.extend(self.inline_mapping());
        MappingTable::new(entries)
    }

    pub fn exclude_set(&self) -> BTreeSet<String> {
        self.compare.exclude.iter().map(|f| normalize_header(f)).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
