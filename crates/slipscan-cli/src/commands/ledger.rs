//! Ledger command - inspect or prune the processing ledger.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use slipscan_core::ProcessingLedger;
use slipscan_core::ledger::TIMESTAMP_FORMAT;

/// Arguments for the ledger command.
#[derive(Args)]
pub struct LedgerArgs {
    /// Directory holding the ledger (the run output directory)
    #[arg(short, long, global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: LedgerCommand,
}

#[derive(Subcommand)]
enum LedgerCommand {
    /// List recorded documents
    Show {
        /// Print entries as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Remove entries older than the retention period
    Prune {
        /// Retention in days (default: from config)
        #[arg(long)]
        days: Option<u32>,
    },
}

pub fn run(args: LedgerArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let mut ledger = ProcessingLedger::load(config.ledger_path(&args.dir))?;

    match args.command {
        LedgerCommand::Show { json } => show(&ledger, json),
        LedgerCommand::Prune { days } => {
            let days = days.unwrap_or(config.ledger.retention_days);
            let before = ledger.len();
            if ledger.prune(days)? {
                println!(
                    "{} Removed {} entries older than {} days, {} left",
                    style("✓").green(),
                    before - ledger.len(),
                    days,
                    ledger.len()
                );
            } else {
                println!("{} Nothing older than {} days", style("ℹ").blue(), days);
            }
            Ok(())
        }
    }
}

fn show(ledger: &ProcessingLedger, json: bool) -> anyhow::Result<()> {
    if ledger.is_empty() {
        println!(
            "{} No entries in {}",
            style("ℹ").blue(),
            ledger.path().display()
        );
        return Ok(());
    }

    for entry in ledger.entries() {
        if json {
            println!("{}", serde_json::to_string(entry)?);
            continue;
        }

        let when = entry
            .processed_at
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| "-".to_string());
        let fields: Vec<String> = entry
            .fields
            .iter()
            .map(|(name, value)| format!("{}={}", name, value.as_str()))
            .collect();

        println!(
            "{}  {:<12} {}  {}",
            when,
            entry.doc_type,
            entry.file_name,
            fields.join(", ")
        );
    }

    let malformed = &ledger.load_report().malformed;
    if !malformed.is_empty() {
        println!(
            "{} {} malformed lines skipped: {:?}",
            style("⚠").yellow(),
            malformed.len(),
            malformed
        );
    }

    Ok(())
}
