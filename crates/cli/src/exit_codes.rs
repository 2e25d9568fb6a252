//! CLI Exit Code Registry
//!
//! Single source of truth for `listcheck` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Reconciled, nothing requires action                  |
//! | 1    | Differences found (any partition row needs action)   |
//! | 2    | CLI usage error (bad args, unsupported file type)    |
//! | 3    | Invalid config (parse or validation failure)         |
//! | 4    | Runtime / IO error (unreadable input, write failure) |
//! | 5    | Schema error (missing or duplicate field)            |
//! | 6    | Cardinality error (several rules for one grouping)   |
//! | 7    | Mapping error (unknown or repeated mapped field)     |
//! | 8    | Duplicate key error (`duplicate_keys = "reject"`)    |
//!
//! Engine failures map through [`recon_exit_code`], keyed on
//! `ReconError::kind()`.

use listcheck_recon::ReconError;

/// Success: every key reconciled, no mismatches.
pub const EXIT_SUCCESS: u8 = 0;

/// Differences found. Like `diff(1)`, exit 1 means "inputs differ."
pub const EXIT_RECON_DIFFS: u8 = 1;

/// Usage error: bad arguments, unsupported input format.
pub const EXIT_USAGE: u8 = 2;

/// Config could not be parsed or failed validation.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 3;

/// Input unreadable, output unwritable, serialization failure.
pub const EXIT_RECON_RUNTIME: u8 = 4;

/// A dataset lacks a required field or repeats a column.
pub const EXIT_RECON_SCHEMA: u8 = 5;

/// The rule dataset holds more than one row per grouping value.
pub const EXIT_RECON_CARDINALITY: u8 = 6;

/// The mapping names a field the authority data lacks, or repeats one.
pub const EXIT_RECON_MAPPING: u8 = 7;

/// Intra-side duplicate key under the reject policy.
pub const EXIT_RECON_DUPLICATE_KEY: u8 = 8;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err.kind() {
        "SchemaError" => EXIT_RECON_SCHEMA,
        "CardinalityError" => EXIT_RECON_CARDINALITY,
        "MappingError" => EXIT_RECON_MAPPING,
        "DuplicateKeyError" => EXIT_RECON_DUPLICATE_KEY,
        "ConfigError" => EXIT_RECON_INVALID_CONFIG,
        _ => EXIT_RECON_RUNTIME,
    }
}
