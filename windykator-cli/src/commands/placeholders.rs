//! Placeholders command - constant values available to every template

use anyhow::Result;
use clap::Subcommand;

use super::get_context;
use crate::output;
use windykator_core::domain::template::default_placeholders;
use windykator_core::ports::SettingsStore;
use windykator_core::{Placeholder, SemanticField};

#[derive(Subcommand)]
pub enum PlaceholderCommands {
    /// List placeholders
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add or update a placeholder
    Set {
        name: String,
        value: String,
        /// What the value is for
        #[arg(long)]
        description: Option<String>,
    },
    /// Remove a placeholder
    Remove { name: String },
    /// Restore the built-in placeholders
    Reset,
}

pub fn run(command: PlaceholderCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        PlaceholderCommands::List { json } => {
            let placeholders = ctx.store.load_placeholders()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&placeholders)?);
                return Ok(());
            }
            if placeholders.is_empty() {
                println!("No placeholders.");
                return Ok(());
            }
            let mut table = output::create_table();
            table.set_header(vec!["Name", "Value", "Description"]);
            for p in &placeholders {
                table.add_row(vec![format!("{{{}}}", p.name), p.value.clone(), p.description.clone()]);
            }
            println!("{}", table);
        }
        PlaceholderCommands::Set { name, value, description } => {
            let name = name.trim().trim_matches(|c| c == '{' || c == '}').to_string();
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                anyhow::bail!("Placeholder names may only contain letters, digits and '_'");
            }
            if SemanticField::ALL.iter().any(|f| f.as_str() == name) {
                output::warning(&format!("'{}' is a record field; record values take precedence", name));
            }

            let mut placeholders = ctx.store.load_placeholders()?;
            match placeholders.iter_mut().find(|p| p.name == name) {
                Some(existing) => {
                    existing.value = value;
                    if let Some(description) = description {
                        existing.description = description;
                    }
                }
                None => placeholders.push(Placeholder::new(&name, value, description.unwrap_or_default())),
            }
            ctx.store.save_placeholders(&placeholders)?;
            output::success(&format!("Saved {{{}}}", name));
        }
        PlaceholderCommands::Remove { name } => {
            let mut placeholders = ctx.store.load_placeholders()?;
            let before = placeholders.len();
            placeholders.retain(|p| p.name != name);
            if placeholders.len() == before {
                anyhow::bail!("No placeholder named '{}'", name);
            }
            ctx.store.save_placeholders(&placeholders)?;
            output::success(&format!("Removed {{{}}}", name));
        }
        PlaceholderCommands::Reset => {
            ctx.store.save_placeholders(&default_placeholders())?;
            output::success("Restored built-in placeholders");
        }
    }

    Ok(())
}
