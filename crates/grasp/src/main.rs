//! grasp - capture-clause checker and desugarer
//!
//! CLI driver: reads host fragments, resolves their capture clauses and prints
//! the desugared code or the diagnostics.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

/// Capture-clause checker and desugarer
#[derive(Parser, Debug)]
#[command(name = "grasp")]
#[command(author, version, about = "Check and desugar closure capture clauses")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format (overrides `[output] format` in grasp.toml)
    #[arg(long, global = true)]
    format: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Configuration file (defaults to ./grasp.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a fragment with its capture clauses desugared
    Desugar(commands::desugar::DesugarArgs),

    /// Check fragment files and report capture diagnostics
    Check(commands::check::CheckArgs),

    /// Explain a diagnostic code
    Explain(commands::explain::ExplainArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    let config = config::Config::load(cli.config.as_deref())?;
    let format = cli.format.or(config.output.format).unwrap_or_default();
    let use_color = !cli.no_color
        && !cli.quiet
        && config.output.color.unwrap_or(true)
        && atty::is(atty::Stream::Stderr);

    match command {
        Commands::Desugar(args) => {
            let settings = commands::Settings::new(&config, format, use_color, cli.quiet)?;
            commands::desugar::run(args, &settings)
        }
        Commands::Check(args) => {
            let settings = commands::Settings::new(&config, format, use_color, cli.quiet)?;
            commands::check::run(args, &settings, cli.verbose)
        }
        Commands::Explain(args) => commands::explain::run(args, format, use_color),
    }
}
