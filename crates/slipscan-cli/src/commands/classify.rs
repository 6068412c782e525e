//! Classify command - inspect a single document without side effects.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use slipscan_core::{DocumentType, ExtractedFields, Pipeline};

/// Arguments for the classify command.
#[derive(Args)]
pub struct ClassifyArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

#[derive(Serialize)]
struct Classification<'a> {
    file: String,
    classifier: &'static str,
    #[serde(rename = "type")]
    doc_type: DocumentType,
    fields: &'a ExtractedFields,
}

pub fn run(args: ClassifyArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    if !args.input.is_file() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let pipeline = match Pipeline::from_config(&config) {
        Ok(pipeline) => pipeline.with_rename(false),
        Err(e) => super::engine_unavailable(&e.to_string()),
    };
    if let Err(e) = pipeline.probe() {
        super::engine_unavailable(&e.to_string());
    }

    let (doc_type, fields) = pipeline.classify_and_extract(&args.input)?;

    let classification = Classification {
        file: args.input.display().to_string(),
        classifier: pipeline.classifier_name(),
        doc_type,
        fields: &fields,
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&classification)?),
        OutputFormat::Text => print!("{}", format_text(&classification)),
    }

    Ok(())
}

fn format_text(classification: &Classification<'_>) -> String {
    let mut output = String::new();

    output.push_str(&format!("File: {}\n", classification.file));
    output.push_str(&format!(
        "Type: {} ({})\n",
        classification.doc_type, classification.classifier
    ));

    if !classification.fields.is_empty() {
        output.push_str("\nFields:\n");
        for (name, value) in classification.fields.iter() {
            output.push_str(&format!("  {}: {}\n", name, value.as_str()));
        }
    }

    output
}
