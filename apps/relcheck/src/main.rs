//! # relcheck
//!
//! Composite-membership validator for map data sets.
//!
//! ## Usage
//!
//! ```bash
//! # Check every composite against a grammar
//! relcheck check --data city.json --grammar roles.toml
//!
//! # Check a few composites, JSON output
//! relcheck check -d city.json -g roles.toml --select composite/12,composite/40 --json
//!
//! # Ask before linking a composite into another
//! relcheck would-cycle -d city.json --parent composite/1 --child composite/7
//!
//! # Apply every available fix
//! relcheck fix -d city.json -g roles.toml -o fixed.json
//! ```

use clap::Parser;
use relcheck::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // RELCHECK_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("RELCHECK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "relcheck=info,relcheck_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    match cli::execute(cli) {
        Ok(cli::Outcome::Clean) => {}
        Ok(cli::Outcome::ErrorsFound) => std::process::exit(1),
        Err(e) => {
            tracing::error!("Error: {}", e);
            std::process::exit(2);
        }
    }
}
