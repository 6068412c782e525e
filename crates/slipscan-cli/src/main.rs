//! CLI application for scanned invoice and payment slip triage.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{check, classify, config, ledger, run};

/// Classify, rename and record scanned invoices (NF) and payment slips (BOLETO)
#[derive(Parser)]
#[command(name = "slipscan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every document of a directory
    Run(run::RunArgs),

    /// Classify and extract a single file without side effects
    Classify(classify::ClassifyArgs),

    /// Inspect or prune the processing ledger
    Ledger(ledger::LedgerArgs),

    /// Report roster aliases with no matching document
    Check(check::CheckArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => run::run(args, config_path),
        Commands::Classify(args) => classify::run(args, config_path),
        Commands::Ledger(args) => ledger::run(args, config_path),
        Commands::Check(args) => check::run(args, config_path),
        Commands::Config(args) => config::run(args, config_path),
    }
}
