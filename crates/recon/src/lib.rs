//! `listcheck-recon`: Security whitelist reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded tables, returns partitioned and
//! compared results. Text loaders for CSV inputs live in [`load`]; file and
//! spreadsheet IO belongs to the CLI.

pub mod align;
pub mod audit;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod keys;
pub mod load;
pub mod matcher;
pub mod merge;
pub mod model;
pub mod summary;

pub use align::{FieldMapping, MappingTable};
pub use config::ReconConfig;
pub use engine::{reconcile, reconcile_with, run, ReconInput, ReconOptions};
pub use error::ReconError;
pub use keys::{CompositeKey, KeyFields};
pub use model::{ReconReport, ReconResult, Table, Value};
pub use summary::Statistics;
