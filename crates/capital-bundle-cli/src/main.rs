mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::optimize::OptimizeArgs;
use commands::risk::RiskScoreArgs;
use commands::thesis::ValidateThesisArgs;

/// Thesis-driven capital bundle optimization
#[derive(Parser)]
#[command(
    name = "cbx",
    version,
    about = "Thesis-driven capital bundle optimization",
    long_about = "Allocates a lender's budget across a catalogue of SME deals so that \
                  deployed capital tracks the thesis sector mix while steering away \
                  from riskier deals. Solves a linear program with decimal-precise \
                  reporting of the resulting bundle."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize a capital bundle for a thesis over a deal catalogue
    Optimize(OptimizeArgs),
    /// Aggregate risk score and LP penalty for one set of ratios
    RiskScore(RiskScoreArgs),
    /// Validate and normalise a thesis file
    ValidateThesis(ValidateThesisArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

/// Filter used when `RUST_LOG` is unset: the engine library and this binary.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "capital_bundle_core=debug,cbx=debug"
    } else {
        "capital_bundle_core=info,cbx=info"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
    // stdout carries the result; logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Optimize(args) => commands::optimize::run_optimize(args),
        Commands::RiskScore(args) => commands::risk::run_risk_score(args),
        Commands::ValidateThesis(args) => commands::thesis::run_validate_thesis(args),
        Commands::Version => {
            println!("cbx {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_names_library_and_binary_targets() {
        for (verbose, level) in [(false, "info"), (true, "debug")] {
            let directives = default_directives(verbose);
            assert!(directives.contains(&format!("capital_bundle_core={}", level)));
            assert!(directives.contains(&format!("cbx={}", level)));
            assert!(EnvFilter::try_new(directives).is_ok());
        }
    }
}
