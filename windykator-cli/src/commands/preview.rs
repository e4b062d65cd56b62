//! Preview command - materialized records as they would be sent

use anyhow::Result;
use chrono::{Local, NaiveDate};
use colored::Colorize;

use super::{get_context, load_pipeline, LoadArgs};
use crate::output;
use windykator_core::SemanticField;

pub fn run(args: &LoadArgs, today: Option<NaiveDate>, limit: usize, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let (pipeline, _) = load_pipeline(&ctx, args, json)?;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let records = pipeline.preview_all(today);
    let shown: Vec<_> = records.iter().take(limit).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No rows to preview.");
        return Ok(());
    }

    let mut table = output::create_table();
    let mut header = vec!["#".to_string()];
    header.extend(SemanticField::ALL.iter().map(|f| f.label().to_string()));
    header.push("Dni po terminie".to_string());
    table.set_header(header);

    for record in &shown {
        let mut row = vec![record.row_index.to_string()];
        row.extend(
            SemanticField::ALL
                .iter()
                .map(|&f| output::truncate(record.field(f), 30)),
        );
        row.push(if record.invoice_date_parsed {
            record.dni_po_terminie.to_string()
        } else {
            "?".yellow().to_string()
        });
        table.add_row(row);
    }
    println!("{}", table);

    if records.len() > shown.len() {
        println!("{} of {} rows shown (use --limit)", shown.len(), records.len());
    } else {
        println!("{} rows", records.len());
    }
    println!("Days overdue as of {} with a {}-day payment term", today, pipeline.payment_term_days());

    Ok(())
}
