mod commands;
mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{convert, replay, transform, ConvertArgs, ReplayArgs, TransformArgs};
use config::Config;
use tracing_subscriber::EnvFilter;

/// Folio CLI - run the editing engine on HTML and operation files
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load HTML into the model and write it back out
    Convert(ConvertArgs),

    /// Apply a JSON array of operations to loaded HTML
    Replay(ReplayArgs),

    /// Transform two concurrent operation lists against each other
    Transform(TransformArgs),
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()
        .context("Cannot get current directory")?
        .display()
        .to_string();
    let config = Config::load(&cwd).context("Failed to load folio.config.json")?;
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    match cli.command {
        Command::Convert(args) => convert(args, &config),
        Command::Replay(args) => replay(args, &config),
        Command::Transform(args) => transform(args),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
