//! Assemblage CLI - a meta-build generator for C and C++

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use assemblage::builder::{PlanError, ProbeError};
use assemblage::core::SpecError;
use assemblage::util::diagnostic::{emit, suggestions, Diagnostic};
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stderr().is_terminal();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            report(&e, color);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    // Set up logging
    let default = if cli.verbose {
        "assemblage=debug"
    } else {
        "assemblage=info"
    };
    let filter = EnvFilter::try_from_env("ASSEMBLAGE_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let request = cli.spec.into_request()?;

    match cli.command {
        Commands::Generate => commands::generate::execute(&request),
        Commands::Build => commands::build::execute(&request),
        Commands::Clean => commands::clean::execute(&request),
        Commands::Probe(args) => commands::probe::execute(&request, args),
    }
}

/// Known failures are shown as diagnostics, one per failing target for
/// planning errors; anything else is printed as an error chain.
fn report(err: &anyhow::Error, color: bool) {
    let diagnostics = if let Some(plan) = find::<PlanError>(err) {
        plan.diagnostics()
    } else if let Some(probe) = find::<ProbeError>(err) {
        vec![probe.to_diagnostic()]
    } else if let Some(missing @ SpecError::NotFound { .. }) = find::<SpecError>(err) {
        vec![Diagnostic::error(missing.to_string()).with_suggestion(suggestions::NO_SPEC)]
    } else {
        eprintln!("error: {:#}", err);
        return;
    };

    for diagnostic in &diagnostics {
        emit(diagnostic, color);
    }
}

fn find<E>(err: &anyhow::Error) -> Option<&E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    err.chain().find_map(|e| e.downcast_ref::<E>())
}
