//! Config command - show and change settings.json

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_context;
use crate::output;
use windykator_core::config::SETTINGS_FILE;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current settings (credentials masked)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set a value, e.g. `wk config set sms.token abc`
    Set { key: String, value: String },
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let mut ctx = get_context()?;

    match command {
        ConfigCommands::Show { json } => {
            let shown = ctx.config.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
                return Ok(());
            }
            println!("{}", ctx.data_dir.join(SETTINGS_FILE).display().to_string().bold());
            println!("{}", serde_json::to_string_pretty(&shown)?);
            if ctx.config.test_mode() != ctx.config.dispatch.test_mode {
                output::info("Test mode is overridden by WINDYKATOR_TEST_MODE");
            }
        }
        ConfigCommands::Set { key, value } => {
            ctx.config.set(&key, &value)?;
            ctx.config.save(&ctx.data_dir)?;
            output::success(&format!("Set {}", key));
        }
    }

    Ok(())
}
