//! Template command - show and edit message templates

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use super::get_context;
use crate::output;
use windykator_core::domain::template::{build_context, render_template};
use windykator_core::domain::DAYS_OVERDUE_KEY;
use windykator_core::ports::SettingsStore;
use windykator_core::{Placeholder, SemanticField, TemplateKind};

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// Print a template and the placeholders it may use
    Show {
        /// email or sms
        kind: TemplateKind,
    },
    /// Replace a template
    Set {
        /// email or sms
        kind: TemplateKind,
        /// Template text
        text: Option<String>,
        /// Read the template text from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Save even if the template uses unknown placeholders
        #[arg(long)]
        force: bool,
    },
    /// Restore the built-in template
    Reset {
        /// email or sms
        kind: TemplateKind,
    },
}

/// Every name a template can reference, mapped to a dummy value
fn known_names(placeholders: &[Placeholder]) -> BTreeMap<String, String> {
    let mut fields: BTreeMap<String, String> = SemanticField::ALL
        .iter()
        .map(|f| (f.as_str().to_string(), String::new()))
        .collect();
    fields.insert(DAYS_OVERDUE_KEY.to_string(), "0".to_string());
    build_context(fields, placeholders)
}

pub fn run(command: TemplateCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        TemplateCommands::Show { kind } => {
            let text = ctx.store.load_template(kind)?;
            println!("{}", format!("{} template", kind).bold());
            println!();
            println!("{}", text);
            println!();

            let placeholders = ctx.store.load_placeholders()?;
            let names: Vec<String> = known_names(&placeholders)
                .into_keys()
                .map(|n| format!("{{{}}}", n))
                .collect();
            println!("{} {}", "Placeholders:".dimmed(), names.join(" "));
        }
        TemplateCommands::Set { kind, text, file, force } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("Provide the template text or --file"),
            };

            let placeholders = ctx.store.load_placeholders()?;
            if let Err(e) = render_template(&text, &known_names(&placeholders)) {
                if !force {
                    anyhow::bail!("{} (use --force to save anyway)", e);
                }
                output::warning(&e.to_string());
            }

            ctx.store.save_template(kind, &text)?;
            output::success(&format!("Saved {} template", kind));
        }
        TemplateCommands::Reset { kind } => {
            ctx.store.reset_template(kind)?;
            output::success(&format!("Restored built-in {} template", kind));
        }
    }

    Ok(())
}
