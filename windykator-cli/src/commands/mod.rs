//! CLI command implementations

pub mod config;
pub mod inspect;
pub mod logs;
pub mod mapping;
pub mod placeholders;
pub mod preview;
pub mod send;
pub mod template;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::output;
use windykator_core::ports::SettingsStore;
use windykator_core::services::{EntryPoint, LoadSummary, LogEvent, LoggingService, Pipeline};
use windykator_core::WindykatorContext;

/// Options shared by every command that reads an invoice file
#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Path to the invoice file (xlsx, xls, ods, csv, tsv, txt)
    pub file: PathBuf,
    /// Worksheet to read instead of the first one
    #[arg(long)]
    pub sheet: Option<String>,
    /// Override one field's column, e.g. --map email=Adres
    #[arg(long = "map", value_name = "FIELD=COLUMN")]
    pub overrides: Vec<String>,
    /// Start from the saved column mapping
    #[arg(long)]
    pub saved_mapping: bool,
    /// Drop rows whose amount is zero, negative or unreadable
    #[arg(long)]
    pub remove_settled: bool,
}

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the data directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("WINDYKATOR_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(dirs::home_dir()
        .context("Could not find home directory")?
        .join(".windykator"))
}

/// Get or create the windykator context
pub fn get_context() -> Result<WindykatorContext> {
    let data_dir = get_data_dir()?;
    WindykatorContext::new(&data_dir)
        .with_context(|| format!("Failed to initialize data directory: {}", data_dir.display()))
}

/// Load the file named in `args` and apply mapping options in order:
/// saved mapping, then `--map` overrides, then settled-item removal
pub fn load_pipeline(ctx: &WindykatorContext, args: &LoadArgs, quiet: bool) -> Result<(Pipeline, LoadSummary)> {
    tracing::debug!(file = %args.file.display(), sheet = ?args.sheet, "loading invoice file");
    let mut pipeline = ctx.pipeline();
    let summary = match &args.sheet {
        Some(sheet) => pipeline.load_sheet(&args.file, sheet),
        None => pipeline.load(&args.file),
    }
    .with_context(|| format!("Failed to load {}", args.file.display()))?;

    if args.saved_mapping {
        match ctx.store.load_mapping()? {
            Some(saved) => {
                let dropped = pipeline.apply_saved_mapping(saved)?;
                if !dropped.is_empty() && !quiet {
                    output::warning(&format!(
                        "Saved mapping refers to missing columns, ignored fields: {}",
                        dropped.join(", ")
                    ));
                }
            }
            None if !quiet => output::warning("No saved mapping, using automatic mapping"),
            None => {}
        }
    }

    for spec in &args.overrides {
        let (field, column) = parse_override(spec)?;
        pipeline.force_mapping(field, column)?;
    }

    if args.remove_settled {
        let removed = pipeline.remove_settled_items();
        if !quiet {
            output::info(&format!("Removed {} settled rows", removed));
        }
    }

    Ok((pipeline, summary))
}

fn parse_override(spec: &str) -> Result<(&str, &str)> {
    let (field, column) = spec
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected FIELD=COLUMN, got '{}'", spec))?;
    let (field, column) = (field.trim(), column.trim());
    if field.is_empty() || column.is_empty() {
        anyhow::bail!("Expected FIELD=COLUMN, got '{}'", spec);
    }
    Ok((field, column))
}
