//! Row materialization - normalized values and days overdue

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::domain::{ColumnMapping, RawTable, SemanticField, SemanticRecord};

use super::cleaning::amount_column;

/// Payment term added to the invoice date when none is configured
pub const DEFAULT_PAYMENT_TERM_DAYS: i64 = 7;

/// Tried in order; the first that parses wins
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d.%m.%Y", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const CURRENCY_TOKENS: [&str; 9] = ["zł", "ZŁ", "Zł", "PLN", "pln", "EUR", "€", "USD", "$"];

// === Amounts ===

fn strip_currency(text: &str) -> String {
    let mut compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    for token in CURRENCY_TOKENS {
        if compact.contains(token) {
            compact = compact.replace(token, "");
        }
    }
    compact
}

/// Parse a locale-formatted amount
///
/// With both separators present the rightmost one is the decimal point.
/// A lone separator followed by exactly three digits (or repeated) is
/// ambiguous and `decimal_hint` decides; otherwise it is the decimal point.
pub fn parse_amount(text: &str, decimal_hint: char) -> Option<Decimal> {
    let s = strip_currency(text);
    if s.is_empty() {
        return None;
    }

    let comma = s.rfind(',');
    let dot = s.rfind('.');
    let canonical = match (comma, dot) {
        (Some(c), Some(d)) => {
            let (decimal, thousands) = if c > d { (',', '.') } else { ('.', ',') };
            s.replace(thousands, "").replace(decimal, ".")
        }
        (Some(pos), None) | (None, Some(pos)) => {
            let sep = if comma.is_some() { ',' } else { '.' };
            let repeated = s.matches(sep).count() > 1;
            let digits_after = s.len() - pos - 1;
            let is_decimal = if repeated {
                false
            } else if digits_after != 3 {
                true
            } else {
                sep == decimal_hint
            };
            if is_decimal {
                s.replace(sep, ".")
            } else {
                s.replace(sep, "")
            }
        }
        (None, None) => s,
    };

    Decimal::from_str(&canonical).ok()
}

/// Decimal separator by majority vote over a column: commas against dots,
/// ties going to the comma
pub fn infer_decimal_separator<'a, I>(values: I) -> char
where
    I: IntoIterator<Item = &'a str>,
{
    let (commas, dots) = values.into_iter().fold((0usize, 0usize), |(c, d), v| {
        (c + v.matches(',').count(), d + v.matches('.').count())
    });
    if dots > commas {
        '.'
    } else {
        ','
    }
}

/// Two decimal places with a decimal comma, or the input unchanged when it
/// does not parse
///
/// Commas are read as decimal points first; locale-formatted leftovers such
/// as `1.234,56` get a second chance through [`parse_amount`].
pub fn format_amount(value: &str) -> String {
    let literal: String = value
        .replace(',', ".")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let parsed = Decimal::from_str(&literal)
        .ok()
        .or_else(|| parse_amount(value, ','));

    match parsed {
        Some(amount) => {
            let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            rounded.rescale(2);
            rounded.to_string().replace('.', ",")
        }
        None => {
            if !value.trim().is_empty() {
                debug!("amount not parseable, keeping raw value");
            }
            value.to_string()
        }
    }
}

// === Normalization ===

/// Normalize the mapped amount, tax id, phone and email columns in place
///
/// Amounts become canonical decimal strings (unparseable ones become
/// missing). Running it twice yields the same table.
pub fn normalize(table: &mut RawTable, mapping: &ColumnMapping) {
    if let Some(index) = column(table, mapping, SemanticField::Kwota) {
        let stripped: Vec<String> = table
            .column_values(index)
            .flatten()
            .map(strip_currency)
            .collect();
        let hint = infer_decimal_separator(stripped.iter().map(String::as_str));
        let mut unparseable = 0usize;
        table.map_column(index, |cell| {
            let text = cell?;
            let parsed = parse_amount(text, hint);
            if parsed.is_none() {
                unparseable += 1;
            }
            parsed.map(|d| d.normalize().to_string())
        });
        debug!(decimal = %hint, unparseable, "amount column normalized");
    }

    if let Some(index) = column(table, mapping, SemanticField::Nip) {
        table.map_column(index, |cell| {
            let compact: String = cell?.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
            Some(compact)
        });
    }

    if let Some(index) = column(table, mapping, SemanticField::Telefon) {
        table.map_column(index, |cell| cell.map(normalize_phone));
    }

    if let Some(index) = column(table, mapping, SemanticField::Email) {
        table.map_column(index, |cell| cell.map(|e| e.trim().to_lowercase()));
    }
}

fn column(table: &RawTable, mapping: &ColumnMapping, field: SemanticField) -> Option<usize> {
    mapping
        .column_for(field)
        .and_then(|col| table.column_index(col))
}

/// Strip spaces; a nine-digit number with a leading zero gets the Polish
/// country code in place of the zero
pub fn normalize_phone(phone: &str) -> String {
    let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() == 9 && compact.starts_with('0') && compact.chars().all(|c| c.is_ascii_digit()) {
        format!("+48{}", &compact[1..])
    } else {
        compact
    }
}

// === Days overdue ===

/// Parse an invoice date against the known formats
pub fn parse_invoice_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Days past `invoice date + payment term`, clamped to zero
///
/// Returns `(0, false)` when the date is missing or unparseable, or when
/// the due date falls outside the calendar.
pub fn days_overdue(invoice_date: &str, today: NaiveDate, payment_term_days: i64) -> (i64, bool) {
    match parse_invoice_date(invoice_date) {
        Some(date) => {
            let due = Duration::try_days(payment_term_days).and_then(|term| date.checked_add_signed(term));
            match due {
                Some(due) => ((today - due).num_days().max(0), true),
                None => {
                    debug!(payment_term_days, "due date out of range, days overdue defaults to 0");
                    (0, false)
                }
            }
        }
        None => {
            if !invoice_date.trim().is_empty() {
                debug!("invoice date not parseable, days overdue defaults to 0");
            }
            (0, false)
        }
    }
}

// === Records ===

/// Materialize one row; `None` when the index is out of range
pub fn materialize(
    table: &RawTable,
    mapping: &ColumnMapping,
    row: usize,
    today: NaiveDate,
    payment_term_days: i64,
) -> Option<SemanticRecord> {
    if row >= table.row_count() {
        return None;
    }

    let mut values = BTreeMap::new();
    for (field, col) in mapping.iter() {
        let raw = table.cell(row, col).unwrap_or("");
        let value = if field == SemanticField::Kwota.as_str() {
            format_amount(raw)
        } else {
            raw.to_string()
        };
        values.insert(field.to_string(), value);
    }
    values
        .entry(SemanticField::DataFaktury.as_str().to_string())
        .or_insert_with(String::new);

    let (dni_po_terminie, invoice_date_parsed) = days_overdue(
        values
            .get(SemanticField::DataFaktury.as_str())
            .map(String::as_str)
            .unwrap_or(""),
        today,
        payment_term_days,
    );

    Some(SemanticRecord {
        row_index: row,
        values,
        dni_po_terminie,
        invoice_date_parsed,
    })
}

/// Materialize every row in table order
pub fn preview_all(
    table: &RawTable,
    mapping: &ColumnMapping,
    today: NaiveDate,
    payment_term_days: i64,
) -> Vec<SemanticRecord> {
    (0..table.row_count())
        .filter_map(|row| materialize(table, mapping, row, today, payment_term_days))
        .collect()
}

/// Zero, negative, blank or unparseable amounts count as settled
fn is_settled(cell: Option<&str>) -> bool {
    cell.and_then(|text| parse_amount(text, ','))
        .map_or(true, |amount| amount <= Decimal::ZERO)
}

/// One flag per row, `true` when the row still has something to collect;
/// `None` when the table has no amount column
pub fn outstanding_rows(table: &RawTable, mapping: &ColumnMapping) -> Option<Vec<bool>> {
    let index = amount_column(table, Some(mapping))?;
    Some(table.column_values(index).map(|cell| !is_settled(cell)).collect())
}
