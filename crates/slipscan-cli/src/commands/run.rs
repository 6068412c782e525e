//! Run command - process a directory of documents.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use slipscan_core::{OutcomeStatus, Pipeline, ProcessingLedger, build_exporter, collect_inputs};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Directory with the documents to process
    #[arg(required = true)]
    input_dir: PathBuf,

    /// Directory for the ledger and the results export (default: input directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Keep file names unchanged
    #[arg(long)]
    no_rename: bool,

    /// Ledger retention in days (overrides the config)
    #[arg(long)]
    retention_days: Option<u32>,
}

pub fn run(args: RunArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;

    if !args.input_dir.is_dir() {
        anyhow::bail!("Input directory not found: {}", args.input_dir.display());
    }
    let output_dir = args.output_dir.unwrap_or_else(|| args.input_dir.clone());
    fs::create_dir_all(&output_dir)?;

    let pipeline = match Pipeline::from_config(&config) {
        Ok(pipeline) => pipeline.with_rename(!args.no_rename),
        Err(e) => super::engine_unavailable(&e.to_string()),
    };
    match pipeline.probe() {
        Ok(version) => info!("OCR engine: {}", version),
        Err(e) => super::engine_unavailable(&e.to_string()),
    }
    info!("Classifier: {}", pipeline.classifier_name());

    let files = collect_inputs(&args.input_dir, &config.input)?;
    if files.is_empty() {
        println!(
            "{} No documents found in {}",
            style("ℹ").blue(),
            args.input_dir.display()
        );
        return Ok(());
    }

    println!(
        "{} Found {} documents to process",
        style("ℹ").blue(),
        files.len()
    );

    let mut ledger = ProcessingLedger::load(config.ledger_path(&output_dir))?;
    let malformed = ledger.load_report().malformed.len();
    if malformed > 0 {
        warn!("{} malformed ledger lines ignored", malformed);
    }
    let retention_days = args.retention_days.unwrap_or(config.ledger.retention_days);
    if ledger.prune(retention_days)? {
        info!("Ledger pruned to {} entries", ledger.len());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let report = pipeline.run_batch(&files, &mut ledger, |outcome| {
        pb.set_message(outcome.result.original_name.clone());
        pb.inc(1);
    });

    pb.finish_with_message("Complete");

    let exporter = build_exporter(&config.export);
    match report.export(exporter.as_ref(), &config.export_path(&output_dir), &mut ledger) {
        Ok(Some(export_path)) => println!(
            "{} Results written to {}",
            style("✓").green(),
            export_path.display()
        ),
        Ok(None) => {}
        Err(e) => {
            eprintln!("{} Export failed: {}", style("✗").red(), e);
            eprintln!("   Not exported:");
            for result in report.exportable() {
                eprintln!("  - {}", result.renamed_name);
            }
            return Err(e.into());
        }
    }

    println!();
    println!(
        "{} Processed {} documents in {:?}",
        style("✓").green(),
        report.outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} recorded, {} duplicates, {} failed",
        style(report.recorded()).green(),
        style(report.duplicates()).yellow(),
        style(report.failed()).red()
    );

    for outcome in &report.outcomes {
        if outcome.status == OutcomeStatus::Recorded {
            println!(
                "   {} -> {} [{}]",
                outcome.result.original_name,
                outcome.result.renamed_name,
                outcome.result.type_label()
            );
        }
    }

    if report.failed() > 0 {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in report.failures() {
            println!(
                "  - {}: {}",
                outcome.path.display(),
                outcome.result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}
