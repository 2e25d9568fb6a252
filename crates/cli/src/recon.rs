//! `listcheck run` / `listcheck validate`: config-driven whitelist reconciliation.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use listcheck_recon::model::{AUTHORITY_PRIMARY, AUTHORITY_RULES, COUNTERPART};
use listcheck_recon::{ReconConfig, ReconError, ReconInput, ReconReport};

use crate::exit_codes::{recon_exit_code, EXIT_RECON_DIFFS, EXIT_RECON_INVALID_CONFIG, EXIT_RECON_RUNTIME};
use crate::{export, load, CliError};

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Run reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  listcheck run whitelist.recon.toml
  listcheck run whitelist.recon.toml --json
  listcheck run whitelist.recon.toml --output result.json --out-dir out/
  listcheck run whitelist.recon.toml --xlsx report.xlsx -v")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file (overrides [output] json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write per-partition CSV files into this directory (overrides [output] dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Write summary and partitions as an Excel workbook
        #[arg(long)]
        xlsx: Option<PathBuf>,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  listcheck validate whitelist.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

pub fn cmd_recon(cmd: ReconCommands, quiet: bool) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run { config, json, output, out_dir, xlsx } => {
            cmd_recon_run(config, json, output, out_dir, xlsx, quiet)
        }
        ReconCommands::Validate { config } => cmd_recon_validate(config),
    }
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn engine_err(err: ReconError) -> CliError {
    let hint = match &err {
        ReconError::Schema { .. } | ReconError::DuplicateColumn { .. } => {
            Some("headers are normalized: trimmed, lowercased, whitespace runs become '_'")
        }
        ReconError::Cardinality { .. } => Some("the rule dataset must hold at most one row per grouping value"),
        ReconError::Mapping { .. } => Some("mapping fields must name columns of the primary or rule dataset"),
        ReconError::DuplicateKey { .. } => {
            Some("set duplicate_keys = \"first_occurrence\" under [compare] to compare the first row")
        }
        _ => None,
    };
    let cli_err = recon_err(recon_exit_code(&err), err.to_string());
    match hint {
        Some(hint) => cli_err.with_hint(hint),
        None => cli_err,
    }
}

fn read_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| CliError::runtime(format!("cannot read config: {e}")))?;
    ReconConfig::from_toml(&config_str).map_err(engine_err)
}

/// Load every input named by the config, resolving paths against `base_dir`.
fn load_input(config: &ReconConfig, base_dir: &Path) -> Result<ReconInput, ReconError> {
    let datasets = &config.datasets;
    let from_file = match &config.mapping.file {
        Some(file) => load::load_mapping(&base_dir.join(file))?.into_entries(),
        None => Vec::new(),
    };

    Ok(ReconInput {
        authority_primary: load::load_table(AUTHORITY_PRIMARY, &base_dir.join(&datasets.authority_primary))?,
        authority_rules: load::load_table(AUTHORITY_RULES, &base_dir.join(&datasets.authority_rules))?,
        counterpart: load::load_table(COUNTERPART, &base_dir.join(&datasets.counterpart))?,
        mapping: config.mapping_table(from_file)?,
    })
}

fn cmd_recon_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    xlsx_file: Option<PathBuf>,
    quiet: bool,
) -> Result<(), CliError> {
    let config = read_config(&config_path)?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let input = load_input(&config, base_dir).map_err(engine_err)?;
    let report = listcheck_recon::run(&config, &input).map_err(engine_err)?;

    // Output
    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::runtime(format!("JSON serialization error: {e}")))?;

    let output_file = output_file.or_else(|| config.output.json.as_ref().map(|p| base_dir.join(p)));
    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::runtime(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    let out_dir = out_dir.or_else(|| config.output.dir.as_ref().map(|p| base_dir.join(p)));
    if let Some(ref dir) = out_dir {
        let written = export::write_partition_csvs(dir, &report.result)
            .map_err(CliError::runtime)?;
        eprintln!("wrote {} files to {}", written.len(), dir.display());
    }

    if let Some(ref path) = xlsx_file {
        export::write_xlsx_report(path, &report.result).map_err(CliError::runtime)?;
        eprintln!("wrote {}", path.display());
    }

    if !quiet {
        print_summary(&report);
    }

    if report.result.statistics.total_action_required > 0 {
        // Summary already printed; exit code alone signals differences
        return Err(recon_err(EXIT_RECON_DIFFS, String::new()));
    }
    Ok(())
}

/// Human summary to stderr.
fn print_summary(report: &ReconReport) {
    let result = &report.result;
    let s = &result.statistics;
    eprintln!(
        "recon '{}': {} authority records, {} counterpart records",
        report.meta.config_name, s.authority_records, s.counterpart_records,
    );
    eprintln!(
        "  authority only: {}, counterpart only: {}, common: {}, mismatched: {}",
        s.authority_only, s.counterpart_only, s.common, s.mismatched,
    );
    eprintln!(
        "  fields: {} compared, {} authority-only, {} skipped",
        s.mapped_fields, s.authority_only_fields, s.skipped_fields,
    );
    for skipped in &result.fields.skipped {
        eprintln!("    skipped: {} -> {} (absent from counterpart)", skipped.authority, skipped.counterpart);
    }
    if !result.integrity.is_clean() {
        let a = &result.integrity.authority;
        let c = &result.integrity.counterpart;
        eprintln!(
            "  integrity: {} / {} missing-key rows, {} / {} padded identities, {} / {} duplicate keys (authority / counterpart)",
            a.sentinel_keys,
            c.sentinel_keys,
            a.padded_identities,
            c.padded_identities,
            a.duplicate_keys.len(),
            c.duplicate_keys.len(),
        );
    }
    eprintln!("  action required: {}", s.total_action_required);
}

fn cmd_recon_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path).map_err(|mut e| {
        if e.code != EXIT_RECON_RUNTIME {
            e.code = EXIT_RECON_INVALID_CONFIG;
        }
        e
    })?;

    let mapping_source = match &config.mapping.file {
        Some(file) => format!("mapping file '{file}' + {} inline field(s)", config.mapping.fields.len()),
        None => format!("{} inline field(s)", config.mapping.fields.len()),
    };
    eprintln!(
        "valid: recon '{}' keyed on {} + {}, {}",
        config.name,
        config.keys.identity.as_deref().unwrap_or("<detected>"),
        config.keys.grouping,
        mapping_source,
    );
    Ok(())
}
