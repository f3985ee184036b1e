//! # relcheck CLI Module
//!
//! This module implements the command-line interface.
//!
//! ## Available Commands
//!
//! - `check` - Validate composites against a role grammar
//! - `would-cycle` - Ask whether a new membership would close a loop
//! - `fix` - Apply every available fix and write the result
//! - `grammar` - List the entries of a role grammar

mod commands;

use clap::{Args, Parser, Subcommand};
use relcheck_core::{CheckerConfig, ValidatorError};
use std::io::Write;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// relcheck - composite-membership validator
///
/// Checks map composites against a declarative role grammar and finds
/// composites that contain themselves.
#[derive(Parser, Debug)]
#[command(name = "relcheck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./relcheck.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Data set and grammar inputs shared by commands that run the checker.
#[derive(Args, Debug, Clone)]
pub struct Inputs {
    /// Data set (JSON)
    #[arg(short, long)]
    pub data: PathBuf,

    /// Role grammar (TOML)
    #[arg(short, long)]
    pub grammar: PathBuf,

    /// Report loops of more than two composites as acceptable
    #[arg(long)]
    pub allow_complex_loops: bool,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate composites and print diagnostics
    Check {
        #[command(flatten)]
        inputs: Inputs,

        /// Entities to check, e.g. composite/12,composite/40 (default: all)
        #[arg(short, long, value_delimiter = ',')]
        select: Vec<String>,
    },

    /// Check whether adding CHILD as a member of PARENT would create a loop
    WouldCycle {
        /// Data set (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Composite that would receive the member
        #[arg(long)]
        parent: String,

        /// Composite that would become a member
        #[arg(long)]
        child: String,

        /// Report loops of more than two composites as acceptable
        #[arg(long)]
        allow_complex_loops: bool,
    },

    /// Apply every available fix and write the resulting data set
    Fix {
        #[command(flatten)]
        inputs: Inputs,

        /// Output data set (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List the entries and roles of a role grammar
    Grammar {
        /// Role grammar (TOML)
        #[arg(short, long)]
        grammar: PathBuf,
    },
}

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing at error severity was found.
    Clean,
    /// At least one error-severity diagnostic, or a loop would be created.
    ErrorsFound,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments, printing to stdout.
pub fn execute(cli: Cli) -> Result<Outcome, ValidatorError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute_to(cli, &mut out)
}

/// Execute the CLI with parsed arguments, printing to `out`.
pub fn execute_to(cli: Cli, out: &mut dyn Write) -> Result<Outcome, ValidatorError> {
    let config = crate::config::load_config(cli.config.as_deref())?;
    let json = cli.json;

    match cli.command {
        Commands::Check { inputs, select } => {
            let config = apply_flags(config, &inputs);
            cmd_check(&inputs.data, &inputs.grammar, &select, config, json, out)
        }
        Commands::WouldCycle {
            data,
            parent,
            child,
            allow_complex_loops,
        } => {
            let allow = config.allow_complex_loops || allow_complex_loops;
            cmd_would_cycle(&data, &parent, &child, allow, json, out)
        }
        Commands::Fix { inputs, output } => {
            let config = apply_flags(config, &inputs);
            cmd_fix(&inputs.data, &inputs.grammar, &output, config, json, out)
        }
        Commands::Grammar { grammar } => cmd_grammar(&grammar, json, out),
    }
}

/// Command-line flags override the configuration file.
fn apply_flags(mut config: CheckerConfig, inputs: &Inputs) -> CheckerConfig {
    if inputs.allow_complex_loops {
        config.allow_complex_loops = true;
    }
    config
}
