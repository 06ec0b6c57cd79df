use anyhow::{Context, Result};
use cadence_core::error::CoreError;
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;
mod parser;
mod timezone;
mod util;
mod views;

fn main() {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        handle_error(e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "cadence=debug,cadence_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)))
        .init();
}

fn run(cli: cli::Cli) -> Result<()> {
    let config = config::Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        cli::Commands::Expand(command) => commands::expand::expand(command, &config),
        cli::Commands::Next(command) => commands::next::next(command, &config),
        cli::Commands::Validate(command) => commands::validate::validate(command, &config),
        cli::Commands::Diff(command) => commands::diff::diff(command, &config),
        cli::Commands::Edit(command) => commands::edit::edit(command, &config),
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    match err.chain().find_map(|e| e.downcast_ref::<CoreError>()) {
        Some(CoreError::Alignment(alignment)) => {
            eprintln!("{} DTSTART is not the first occurrence", "Error:".style(error_style));
            eprintln!("  DTSTART:  {}", alignment.dtstart.yellow());
            eprintln!("  Found:    {}", alignment.diagnostic);
        }
        Some(CoreError::InvalidTimezone(name)) => {
            eprintln!(
                "{} Unknown timezone '{}'. Use IANA names like 'America/New_York'",
                "Error:".style(error_style),
                name.yellow()
            );
        }
        Some(core_error) if err.downcast_ref::<CoreError>().is_none() => {
            eprintln!("{} {}: {}", "Error:".style(error_style), err, core_error);
        }
        _ => eprintln!("{} {}", "Error:".style(error_style), err),
    }
}
