//! Cleaning - strip noise from a freshly ingested table
//!
//! Every pass here is idempotent, so running `clean` on an already clean
//! table changes nothing.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{is_blank, ColumnMapping, RawTable, SemanticField};

/// Characters removed from every cell: straight and typographic double
/// quotes, the replacement character left by bad decoding, and stray BOMs
const STRIPPED_CHARS: [char; 5] = ['"', '\u{201C}', '\u{201D}', '\u{FFFD}', '\u{FEFF}'];

/// Substrings of column names that suggest an amount column
pub const AMOUNT_KEYWORDS: [&str; 6] = ["netto", "kwota", "wartość", "wartosc", "brutto", "amount"];

/// What a cleaning pass removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub dropped_columns: Vec<String>,
    pub dropped_rows: usize,
}

/// Run all structural cleaning passes in place
pub fn clean(table: &mut RawTable) -> CleanReport {
    strip_cell_noise(table);
    normalize_column_names(table);
    let dropped_columns = drop_empty_columns(table);
    let dropped_rows = drop_empty_rows(table);

    info!(
        rows = table.row_count(),
        columns = table.column_count(),
        dropped_columns = dropped_columns.len(),
        dropped_rows,
        "table cleaned"
    );

    CleanReport {
        dropped_columns,
        dropped_rows,
    }
}

fn strip_cell_noise(table: &mut RawTable) {
    for index in 0..table.column_count() {
        table.map_column(index, |cell| {
            let cleaned: String = cell?
                .chars()
                .filter(|c| !STRIPPED_CHARS.contains(c))
                .collect();
            let trimmed = cleaned.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        });
    }
}

fn normalize_column_names(table: &mut RawTable) {
    table.rename_columns(|name| {
        name.trim()
            .trim_start_matches('\u{FEFF}')
            .trim_matches('"')
            .trim()
            .to_string()
    });
    table.dedupe_columns();
}

/// Drop columns whose every cell is missing or whitespace; returns their names
fn drop_empty_columns(table: &mut RawTable) -> Vec<String> {
    let empty: Vec<usize> = (0..table.column_count())
        .filter(|&i| {
            table
                .column_values(i)
                .all(|cell| is_blank(cell.map(str::trim)))
        })
        .collect();
    let names: Vec<String> = empty.iter().map(|&i| table.columns()[i].clone()).collect();
    if !names.is_empty() {
        debug!(columns = ?names, "dropping empty columns");
        table.retain_columns(|i| !empty.contains(&i));
    }
    names
}

fn drop_empty_rows(table: &mut RawTable) -> usize {
    table.retain_rows(|row| !row.iter().all(|cell| is_blank(cell.as_deref().map(str::trim))))
}

/// Column holding amounts: the mapped `kwota` column when it exists,
/// otherwise the first column whose name contains an amount keyword
pub fn amount_column(table: &RawTable, mapping: Option<&ColumnMapping>) -> Option<usize> {
    if let Some(index) = mapping
        .and_then(|m| m.column_for(SemanticField::Kwota))
        .and_then(|col| table.column_index(col))
    {
        return Some(index);
    }
    table.columns().iter().position(|name| {
        let lower = name.to_lowercase();
        AMOUNT_KEYWORDS.iter().any(|k| lower.contains(k))
    })
}

/// Whether an amount cell reads as zero or nothing at all
///
/// Decimal commas become points and spaces go before the check, so `0`,
/// `0,0` and `0,00` all count. Text that is not a number is kept.
pub fn is_zero_amount(cell: Option<&str>) -> bool {
    match cell {
        None => true,
        Some(text) => {
            let compact: String = text.replace(',', ".").chars().filter(|c| !c.is_whitespace()).collect();
            compact.is_empty() || Decimal::from_str(&compact).map_or(false, |amount| amount.is_zero())
        }
    }
}

/// Remove rows whose amount is zero or blank; returns how many were removed
pub fn remove_zero_amounts(table: &mut RawTable, mapping: Option<&ColumnMapping>) -> usize {
    let Some(index) = amount_column(table, mapping) else {
        warn!("no amount column found, zero-amount filter skipped");
        return 0;
    };
    let removed = table.retain_rows(|row| !is_zero_amount(row[index].as_deref()));
    if removed > 0 {
        info!(removed, column = %table.columns()[index], "zero-amount rows removed");
    }
    removed
}
