//! CLI subcommands.

pub mod check;
pub mod classify;
pub mod config;
pub mod ledger;
pub mod run;

use std::path::{Path, PathBuf};

use console::style;
use tracing::debug;

use slipscan_core::SlipscanConfig;

/// Exit status when no OCR engine can be used.
pub const EXIT_ENGINE_UNAVAILABLE: i32 = 2;

/// Default configuration file, `<config dir>/slipscan/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slipscan")
        .join("config.json")
}

/// Configuration file in effect: `--config` when given, else the default.
pub fn config_file(config_path: Option<&str>) -> PathBuf {
    config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Load the configuration in effect.
///
/// An explicit `--config` must exist; a missing default file means defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<SlipscanConfig> {
    if let Some(path) = config_path {
        return Ok(SlipscanConfig::from_file(Path::new(path))?);
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Using config {}", path.display());
        Ok(SlipscanConfig::from_file(&path)?)
    } else {
        Ok(SlipscanConfig::default())
    }
}

/// Report an unusable OCR engine and exit.
pub fn engine_unavailable(reason: &str) -> ! {
    eprintln!("{} OCR engine unavailable: {}", style("✗").red(), reason);
    std::process::exit(EXIT_ENGINE_UNAVAILABLE)
}
