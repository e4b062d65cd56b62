//! Inspect and sheets commands - how a file was read and mapped

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::{get_context, load_pipeline, LoadArgs};
use crate::output;
use windykator_core::services::Pipeline;
use windykator_core::REQUIRED_FIELDS;

pub fn run(args: &LoadArgs, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let (pipeline, summary) = load_pipeline(&ctx, args, json)?;

    let fields = pipeline.mapping_summary();
    let unmapped = pipeline.unmapped_columns();
    let missing: Vec<&str> = pipeline
        .validate_mapping(&REQUIRED_FIELDS)
        .iter()
        .map(|f| f.as_str())
        .collect();

    if json {
        let value = serde_json::json!({
            "file": args.file.display().to_string(),
            "summary": summary,
            "rows": pipeline.row_count(),
            "mapping": pipeline.mapping(),
            "fields": fields,
            "unmappedColumns": unmapped,
            "missingRequired": missing,
            "coverage": pipeline.coverage(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", args.file.display().to_string().bold());
    println!("  Format:  {}", summary.source);
    println!("  Rows:    {}", pipeline.row_count());
    println!("  Columns: {}", summary.columns);
    if !summary.dropped_columns.is_empty() {
        println!("  Dropped empty columns: {}", summary.dropped_columns.join(", "));
    }
    if summary.dropped_rows > 0 {
        println!("  Dropped empty rows: {}", summary.dropped_rows);
    }
    if summary.zero_amount_rows > 0 {
        println!("  Dropped zero-amount rows: {}", summary.zero_amount_rows);
    }
    println!();

    let mut table = output::create_table();
    table.set_header(vec!["Field", "Column", "Filled"]);
    for field in &fields {
        let column = match &field.column {
            Some(c) => c.clone(),
            None => "-".dimmed().to_string(),
        };
        let filled = if field.column.is_some() {
            format!("{:.0}%", field.filled_percent)
        } else {
            String::new()
        };
        table.add_row(vec![field.label.clone(), column, filled]);
    }
    println!("{}", table);

    println!("Coverage: {:.0}% of columns mapped", pipeline.coverage());
    if !unmapped.is_empty() {
        println!("Unmapped columns: {}", unmapped.join(", "));
    }
    if missing.is_empty() {
        output::success("All required fields are mapped");
    } else {
        output::warning(&format!("Missing required fields: {}", missing.join(", ")));
    }

    Ok(())
}

pub fn run_sheets(file: &Path, json: bool) -> Result<()> {
    let sheets = Pipeline::list_sheets(file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sheets)?);
        return Ok(());
    }

    if sheets.is_empty() {
        println!("No worksheets (delimited text file).");
        return Ok(());
    }
    for (i, name) in sheets.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }
    Ok(())
}
