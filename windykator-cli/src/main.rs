//! Windykator CLI - payment reminders from invoice spreadsheets

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

use commands::{config, inspect, logs, mapping, placeholders, preview, send, template, LoadArgs};
use windykator_core::services::LogEvent;

/// Windykator - payment reminders from invoice spreadsheets
#[derive(Parser)]
#[command(name = "wk", version, about, long_about = None)]
struct Cli {
    /// More diagnostic output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a file was read and how its columns were mapped
    Inspect {
        #[command(flatten)]
        load: LoadArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List worksheet names of a workbook
    Sheets {
        /// Path to the workbook
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Preview materialized records
    Preview {
        #[command(flatten)]
        load: LoadArgs,
        /// Evaluate days overdue as of this date (YYYY-MM-DD)
        #[arg(long)]
        today: Option<chrono::NaiveDate>,
        /// Maximum number of rows to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the saved column mapping
    Mapping {
        #[command(subcommand)]
        command: mapping::MappingCommands,
    },

    /// Manage message templates
    Template {
        #[command(subcommand)]
        command: template::TemplateCommands,
    },

    /// Manage constant template placeholders
    Placeholders {
        #[command(subcommand)]
        command: placeholders::PlaceholderCommands,
    },

    /// Send payment reminders
    Send(send::SendArgs),

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Inspect { .. } => "inspect",
            Commands::Sheets { .. } => "sheets",
            Commands::Preview { .. } => "preview",
            Commands::Mapping { .. } => "mapping",
            Commands::Template { .. } => "template",
            Commands::Placeholders { .. } => "placeholders",
            Commands::Send(_) => "send",
            Commands::Config { .. } => "config",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("WINDYKATOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command_name = cli.command.name();
    let logger = commands::get_logger();
    commands::log_event(&logger, LogEvent::new("command_run").with_command(command_name));

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            commands::log_event(
                &logger,
                LogEvent::new("command_failed")
                    .with_command(command_name)
                    .with_error(e.to_string()),
            );
            output::error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Inspect { load, json } => inspect::run(&load, json),
        Commands::Sheets { file, json } => inspect::run_sheets(&file, json),
        Commands::Preview { load, today, limit, json } => preview::run(&load, today, limit, json),
        Commands::Mapping { command } => mapping::run(command),
        Commands::Template { command } => template::run(command),
        Commands::Placeholders { command } => placeholders::run(command),
        Commands::Send(args) => send::run(args),
        Commands::Config { command } => config::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
