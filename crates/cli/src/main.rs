// listcheck CLI - security whitelist reconciliation, headless

mod exit_codes;
mod export;
mod load;
mod logging;
mod recon;

use std::process::ExitCode;

use clap::Parser;

use exit_codes::{EXIT_RECON_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};
use recon::ReconCommands;

#[derive(Parser)]
#[command(name = "listcheck")]
#[command(about = "Reconcile a counterpart security whitelist against the authority list")]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Errors only; no summary
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: ReconCommands,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not usage errors
            return ExitCode::from(if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS });
        }
    };
    logging::init(logging::level(cli.verbose, cli.quiet));

    match recon::cmd_recon(cli.command, cli.quiet) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self { code: EXIT_RECON_RUNTIME, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
