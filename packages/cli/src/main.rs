mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check_config, init, normalize, CheckConfigArgs, InitArgs, NormalizeArgs};
use tracing_subscriber::EnvFilter;

/// Folio CLI - normalize documents and check editor configuration
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log conversion and post-fixer activity
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new Folio project
    Init(InitArgs),

    /// Run .html documents through the editor's data pipeline
    Normalize(NormalizeArgs),

    /// Validate folio.config.json by starting an editor with it
    CheckConfig(CheckConfigArgs),
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?.display().to_string();
    match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Normalize(args) => normalize(args, &cwd),
        Command::CheckConfig(args) => check_config(args, &cwd),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
