//! Mapping command - manage the saved column mapping

use anyhow::Result;
use clap::Subcommand;

use super::{get_context, load_pipeline, LoadArgs};
use crate::output;
use windykator_core::ports::SettingsStore;

#[derive(Subcommand)]
pub enum MappingCommands {
    /// Show the saved mapping
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save the mapping resolved for a file (after --map overrides)
    Save {
        #[command(flatten)]
        load: LoadArgs,
    },
    /// Forget the saved mapping
    Clear,
}

pub fn run(command: MappingCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        MappingCommands::Show { json } => {
            let saved = ctx.store.load_mapping()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&saved)?);
                return Ok(());
            }
            match saved {
                Some(mapping) if !mapping.is_empty() => {
                    let mut table = output::create_table();
                    table.set_header(vec!["Field", "Column"]);
                    for (field, column) in mapping.iter() {
                        table.add_row(vec![field, column]);
                    }
                    println!("{}", table);
                }
                _ => println!("No saved mapping."),
            }
        }
        MappingCommands::Save { load } => {
            let (pipeline, _) = load_pipeline(&ctx, &load, false)?;
            ctx.store.save_mapping(pipeline.mapping())?;
            output::success(&format!("Saved mapping with {} fields", pipeline.mapping().len()));
        }
        MappingCommands::Clear => {
            ctx.store.clear_mapping()?;
            output::success("Saved mapping cleared");
        }
    }

    Ok(())
}
