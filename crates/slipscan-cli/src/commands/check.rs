//! Check command - roster aliases without a matching document.

use std::path::PathBuf;

use chrono::Local;
use clap::Args;
use console::style;

use slipscan_core::roster::{Period, missing_documents, read_roster};

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Roster CSV (columns Apelido, Mês, Ano, optionally Codigo)
    #[arg(short, long)]
    roster: PathBuf,

    /// Directory with the documents
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Month to check (default: previous month)
    #[arg(long, requires = "year", conflicts_with = "all")]
    month: Option<u32>,

    /// Year to check
    #[arg(long, requires = "month", conflicts_with = "all")]
    year: Option<i32>,

    /// Check every roster row regardless of month
    #[arg(long)]
    all: bool,

    /// List the matching roster rows before checking
    #[arg(long)]
    list: bool,
}

/// Exit status when documents are missing.
const EXIT_MISSING: i32 = 1;

pub fn run(args: CheckArgs, _config_path: Option<&str>) -> anyhow::Result<()> {
    if !args.roster.exists() {
        anyhow::bail!("Roster not found: {}", args.roster.display());
    }

    let roster = read_roster(&args.roster)?;
    let period = match (args.all, args.month, args.year) {
        (true, _, _) => None,
        (false, Some(month), Some(year)) => Some(Period::new(month, year)),
        _ => Some(Period::previous_month(Local::now().date_naive())),
    };

    let expected: Vec<_> = roster
        .iter()
        .filter(|row| period.is_none_or(|p| row.in_period(p)))
        .collect();
    let scope = period
        .map(|p| format!("for {}", p))
        .unwrap_or_else(|| "in the roster".to_string());

    if expected.is_empty() {
        println!("{} No roster aliases {}", style("⚠").yellow(), scope);
        return Ok(());
    }

    if args.list {
        for (i, row) in expected.iter().enumerate() {
            println!(
                "{} | {} | {}",
                i + 1,
                row.alias,
                row.code.as_deref().unwrap_or("-")
            );
        }
        println!();
    }

    let missing = missing_documents(&roster, period, &args.dir)?;

    if missing.is_empty() {
        println!(
            "{} All documents {} are present",
            style("✓").green(),
            scope
        );
        return Ok(());
    }

    println!(
        "{} {} aliases {} have no matching PDF:",
        style("✗").red(),
        missing.len(),
        scope
    );
    for alias in &missing {
        println!("  - {}.pdf", alias);
    }
    std::process::exit(EXIT_MISSING)
}
