use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// A required field is absent from a dataset's schema.
    Schema {
        dataset: String,
        field: String,
        available: Vec<String>,
    },
    /// Two columns of one dataset normalize to the same header.
    DuplicateColumn { dataset: String, column: String },
    /// The rule dataset holds more than one row for a grouping value.
    Cardinality {
        dataset: String,
        field: String,
        value: String,
        rows: usize,
    },
    /// A mapping entry references a field the merged authority dataset lacks.
    Mapping { field: String, dataset: String },
    /// The same authority field appears twice in the mapping table.
    DuplicateMapping { field: String },
    /// Intra-side key collision under the `reject` duplicate policy.
    DuplicateKey {
        dataset: String,
        key: String,
        rows: usize,
    },
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error.
    ConfigValidation(String),
    /// Reading or decoding an input failed.
    Io(String),
}

impl ReconError {
    /// Taxonomy name surfaced to callers and exit-code mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } | Self::DuplicateColumn { .. } => "SchemaError",
            Self::Cardinality { .. } => "CardinalityError",
            Self::Mapping { .. } | Self::DuplicateMapping { .. } => "MappingError",
            Self::DuplicateKey { .. } => "DuplicateKeyError",
            Self::ConfigParse(_) | Self::ConfigValidation(_) => "ConfigError",
            Self::Io(_) => "IoError",
        }
    }

    pub(crate) fn schema(dataset: &str, field: &str, available: &[String]) -> Self {
        Self::Schema {
            dataset: dataset.into(),
            field: field.into(),
            available: available.to_vec(),
        }
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema { dataset, field, available } => {
                write!(
                    f,
                    "dataset '{dataset}': missing field '{field}' (available: {})",
                    available.join(", ")
                )
            }
            Self::DuplicateColumn { dataset, column } => {
                write!(f, "dataset '{dataset}': column '{column}' appears more than once")
            }
            Self::Cardinality { dataset, field, value, rows } => {
                write!(
                    f,
                    "dataset '{dataset}': {rows} rows share {field} '{value}' (at most one rule per {field})"
                )
            }
            Self::Mapping { field, dataset } => {
                write!(f, "mapping references field '{field}' not present in '{dataset}'")
            }
            Self::DuplicateMapping { field } => {
                write!(f, "mapping lists authority field '{field}' more than once")
            }
            Self::DuplicateKey { dataset, key, rows } => {
                write!(f, "dataset '{dataset}': key '{key}' appears on {rows} rows")
            }
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
