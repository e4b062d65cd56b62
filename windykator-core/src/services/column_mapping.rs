//! Column mapping - resolve semantic fields to physical columns
//!
//! Three passes run in a fixed order: header synonyms, cell-content
//! patterns for whatever is still unresolved, and finally a table of
//! header names seen in real exports. No pass ever overwrites a field an
//! earlier pass resolved.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{is_blank, ColumnMapping, RawTable, SemanticField};

/// Rows inspected per column by the content pass
const SAMPLE_ROWS: usize = 100;

/// Header synonyms per field, compared trimmed and lowercased
fn synonyms(field: SemanticField) -> &'static [&'static str] {
    match field {
        SemanticField::Kontrahent => &[
            "kontrahent",
            "nazwa",
            "nazwa firmy",
            "firma",
            "klient",
            "odbiorca",
            "odbiorca płatności",
        ],
        SemanticField::Nip => &["nip", "numer nip", "tax id", "identyfikator podatkowy"],
        SemanticField::NrFaktury => &[
            "nr faktury",
            "numer faktury",
            "faktura",
            "nr",
            "numer",
            "invoice",
            "invoice number",
        ],
        SemanticField::Email => &["email", "e-mail", "adres email", "mail", "e-mail adres"],
        SemanticField::Telefon => &[
            "telefon",
            "phone",
            "tel",
            "numer telefonu",
            "phone number",
            "telefon komórkowy",
            "telefon komorkowy",
        ],
        SemanticField::Kwota => &[
            "kwota",
            "amount",
            "suma",
            "wartość",
            "kwota brutto",
            "brutto",
            "netto",
            "kwota netto",
            "kwota płatności",
        ],
        SemanticField::DataFaktury => &[
            "data faktury",
            "data",
            "data wystawienia",
            "data utworzenia",
            "date",
            "invoice date",
            "wystawienia",
        ],
    }
}

/// Exact header names from real exports, including mojibake-damaged ones,
/// and the field each one feeds
const LITERAL_OVERRIDES: &[(&str, &str)] = &[
    ("Kontrahent", "kontrahent"),
    ("NIP", "nip"),
    ("EMAIL", "email"),
    ("Telefon komorkowy", "telefon"),
    ("Netto", "kwota"),
    ("Numer", "nr_faktury"),
    ("Data", "data_faktury"),
    ("VAT", "vat"),
    ("Kwota p?atno?ci", "kwota_platnosci"),
    ("Kwota p\u{FFFD}atno\u{FFFD}ci", "kwota_platnosci"),
    ("Warto??/B", "wartosc_brutto"),
    ("Warto\u{FFFD}\u{FFFD}/B", "wartosc_brutto"),
];

struct Patterns {
    nip: Regex,
    phone: Regex,
    phone_loose: Regex,
    amount: Regex,
    date: Regex,
    invoice: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        nip: Regex::new(r"^\d{10}$").expect("valid regex"),
        phone: Regex::new(r"^\d{9}$").expect("valid regex"),
        phone_loose: Regex::new(r"^\+?[\d\s\-()]{9,}$").expect("valid regex"),
        amount: Regex::new(
            r"^-?(?:\d{1,3}(?:[ \u{00A0}.,]\d{3})+|\d+)[.,]\d{1,2}(?:\s*(?:zł|PLN))?$",
        )
        .expect("valid regex"),
        date: Regex::new(r"^(?:\d{2}\.\d{2}\.\d{4}|\d{4}-\d{2}-\d{2})(?:[ T]\d{2}:\d{2}(?::\d{2})?)?$")
            .expect("valid regex"),
        invoice: Regex::new(r"^(?:[A-Za-z]+/)?(?:\d+/)+\d{4}$").expect("valid regex"),
    })
}

/// Content classifiers in priority order
const CONTENT_MATCHERS: [(SemanticField, fn(&str) -> bool); 7] = [
    (SemanticField::Nip, looks_like_nip),
    (SemanticField::Email, looks_like_email),
    (SemanticField::Telefon, looks_like_phone),
    (SemanticField::Telefon, looks_like_phone_loose),
    (SemanticField::Kwota, looks_like_amount),
    (SemanticField::DataFaktury, looks_like_date),
    (SemanticField::NrFaktury, looks_like_invoice_number),
];

fn looks_like_nip(value: &str) -> bool {
    patterns().nip.is_match(&compact(value))
}

fn looks_like_email(value: &str) -> bool {
    value.contains('@')
}

fn looks_like_phone(value: &str) -> bool {
    patterns().phone.is_match(&compact(value))
}

fn looks_like_phone_loose(value: &str) -> bool {
    patterns().phone_loose.is_match(value) && value.chars().filter(|c| c.is_ascii_digit()).count() >= 9
}

fn looks_like_amount(value: &str) -> bool {
    patterns().amount.is_match(value)
}

fn looks_like_date(value: &str) -> bool {
    patterns().date.is_match(value)
}

fn looks_like_invoice_number(value: &str) -> bool {
    patterns().invoice.is_match(value)
}

fn compact(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace() && *c != '-').collect()
}

/// Compute a mapping from header names and a sample of cell contents
pub fn auto_map(table: &RawTable) -> ColumnMapping {
    let mut mapping = ColumnMapping::new();

    map_by_name(table, &mut mapping);
    map_by_content(table, &mut mapping);
    apply_literal_overrides(table, &mut mapping);

    info!(
        mapped = mapping.len(),
        columns = table.column_count(),
        mapping = ?mapping.iter().collect::<Vec<_>>(),
        "columns mapped"
    );
    mapping
}

/// Synonyms are tried in list order; for each one the first column whose
/// trimmed, lowercased name equals it wins the field
fn map_by_name(table: &RawTable, mapping: &mut ColumnMapping) {
    let normalized: Vec<String> = table
        .columns()
        .iter()
        .map(|col| col.trim().to_lowercase())
        .collect();
    for field in SemanticField::ALL {
        let found = synonyms(field)
            .iter()
            .find_map(|synonym| normalized.iter().position(|name| name == synonym));
        if let Some(index) = found {
            let column = &table.columns()[index];
            debug!(field = %field, column = %column, "mapped by name");
            mapping.insert_if_absent(field.as_str(), column);
        }
    }
}

fn map_by_content(table: &RawTable, mapping: &mut ColumnMapping) {
    for (field, matches) in CONTENT_MATCHERS {
        if mapping.contains(field.as_str()) {
            continue;
        }
        let found = table.columns().iter().enumerate().find(|(index, col)| {
            !mapping.maps_column(col)
                && table
                    .column_values(*index)
                    .take(SAMPLE_ROWS)
                    .filter(|cell| !is_blank(*cell))
                    .flatten()
                    .any(|value| matches(value.trim()))
        });
        if let Some((_, column)) = found {
            debug!(field = %field, column = %column, "mapped by content");
            mapping.insert_if_absent(field.as_str(), column);
        }
    }
}

fn apply_literal_overrides(table: &RawTable, mapping: &mut ColumnMapping) {
    for (column, field) in LITERAL_OVERRIDES {
        if table.has_column(column) && mapping.insert_if_absent(field, column) {
            debug!(field = %field, column = %column, "mapped by known header");
        }
    }
}

/// Fields from `required` that are not mapped to a non-empty column
pub fn validate_mapping(mapping: &ColumnMapping, required: &[SemanticField]) -> Vec<SemanticField> {
    mapping.missing(required)
}

/// Percentage of the table's columns that some field points to
pub fn coverage(table: &RawTable, mapping: &ColumnMapping) -> f64 {
    if table.column_count() == 0 {
        return 0.0;
    }
    let mapped = mapping
        .iter()
        .filter(|(_, col)| !col.is_empty() && table.has_column(col))
        .count();
    mapped as f64 / table.column_count() as f64 * 100.0
}

/// Physical columns no field points to
pub fn unmapped_columns(table: &RawTable, mapping: &ColumnMapping) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|col| !mapping.maps_column(col))
        .cloned()
        .collect()
}

/// Per-field view of the mapping for front ends
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub field: String,
    pub label: String,
    pub column: Option<String>,
    /// Share of non-empty cells in the mapped column, 0-100
    pub filled_percent: f64,
}

/// Every semantic field plus any mapped extra field, with fill rates
pub fn mapping_summary(table: &RawTable, mapping: &ColumnMapping) -> Vec<FieldSummary> {
    let mut fields: Vec<(String, String)> = SemanticField::ALL
        .iter()
        .map(|f| (f.as_str().to_string(), f.label().to_string()))
        .collect();
    for (field, _) in mapping.iter() {
        if !fields.iter().any(|(f, _)| f == field) {
            fields.push((field.to_string(), field.to_string()));
        }
    }

    fields
        .into_iter()
        .map(|(field, label)| {
            let column = mapping.get(&field).filter(|c| !c.is_empty()).map(str::to_string);
            let filled_percent = column
                .as_deref()
                .and_then(|c| table.column_index(c))
                .map(|index| {
                    if table.row_count() == 0 {
                        return 0.0;
                    }
                    let filled = table.column_values(index).filter(|c| !is_blank(*c)).count();
                    filled as f64 / table.row_count() as f64 * 100.0
                })
                .unwrap_or(0.0);
            FieldSummary {
                field,
                label,
                column,
                filled_percent,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_pass_is_case_insensitive() {
        let table = RawTable::from_strings(
            &[" E-Mail ", "Numer Faktury", "KWOTA BRUTTO"],
            &[&["a@b.pl", "1", "10,00"]],
        );
        let mapping = auto_map(&table);
        assert_eq!(mapping.get("email"), Some(" E-Mail "));
        assert_eq!(mapping.get("nr_faktury"), Some("Numer Faktury"));
        assert_eq!(mapping.get("kwota"), Some("KWOTA BRUTTO"));
    }

    #[test]
    fn test_synonym_order_decides_between_columns() {
        let table = RawTable::from_strings(
            &["Nazwa", "Kontrahent", "Netto", "Kwota"],
            &[&["A", "B", "1,00", "2,00"]],
        );
        let mapping = auto_map(&table);
        assert_eq!(mapping.get("kontrahent"), Some("Kontrahent"));
        assert_eq!(mapping.get("kwota"), Some("Kwota"));
    }

    #[test]
    fn test_earlier_column_wins_for_same_synonym() {
        let table = RawTable::from_strings(&["email", " EMAIL "], &[&["a@b.pl", "c@d.pl"]]);
        let mapping = auto_map(&table);
        assert_eq!(mapping.get("email"), Some("email"));
    }

    #[test]
    fn test_content_pass_fills_gaps() {
        let table = RawTable::from_strings(
            &["A", "B", "C", "D", "E", "F"],
            &[
                &["1234567890", "x@y.pl", "501 234 567", "1 234,56", "01.02.2024", "FV/12/2024"],
                &["", "", "", "", "", ""],
            ],
        );
        let mapping = auto_map(&table);
        assert_eq!(mapping.get("nip"), Some("A"));
        assert_eq!(mapping.get("email"), Some("B"));
        assert_eq!(mapping.get("telefon"), Some("C"));
        assert_eq!(mapping.get("kwota"), Some("D"));
        assert_eq!(mapping.get("data_faktury"), Some("E"));
        assert_eq!(mapping.get("nr_faktury"), Some("F"));
        assert_eq!(mapping.get("kontrahent"), None);
    }

    #[test]
    fn test_content_pass_skips_claimed_columns() {
        let table = RawTable::from_strings(&["Telefon", "X"], &[&["501234567", "600700800"]]);
        let mapping = auto_map(&table);
        assert_eq!(mapping.get("telefon"), Some("Telefon"));
        assert_eq!(mapping.get("nip"), None);
        assert!(!mapping.maps_column("X"));
    }

    #[test]
    fn test_literal_overrides_fill_extra_fields() {
        let table = RawTable::from_strings(
            &["Kontrahent", "VAT", "Kwota p\u{FFFD}atno\u{FFFD}ci", "Warto??/B"],
            &[&["A", "23", "x", "y"]],
        );
        let mapping = auto_map(&table);
        assert_eq!(mapping.get("kontrahent"), Some("Kontrahent"));
        assert_eq!(mapping.get("vat"), Some("VAT"));
        assert_eq!(mapping.get("kwota_platnosci"), Some("Kwota p\u{FFFD}atno\u{FFFD}ci"));
        assert_eq!(mapping.get("wartosc_brutto"), Some("Warto??/B"));
    }

    #[test]
    fn test_literal_override_never_replaces_resolved_field() {
        let table = RawTable::from_strings(&["Kwota", "Netto"], &[&["1,00", "2,00"]]);
        let mapping = auto_map(&table);
        assert_eq!(mapping.get("kwota"), Some("Kwota"));
    }

    #[test]
    fn test_coverage_and_unmapped() {
        let table = RawTable::from_strings(&["Kontrahent", "Uwagi"], &[&["A", "x"]]);
        let mapping = auto_map(&table);
        assert_eq!(coverage(&table, &mapping), 50.0);
        assert_eq!(unmapped_columns(&table, &mapping), vec!["Uwagi".to_string()]);
        assert_eq!(coverage(&RawTable::default(), &mapping), 0.0);
    }

    #[test]
    fn test_mapping_summary_reports_fill_rate() {
        let table = RawTable::from_strings(&["Email"], &[&["a@b.pl"], &[""]]);
        let mapping = auto_map(&table);
        let summary = mapping_summary(&table, &mapping);
        let email = summary.iter().find(|s| s.field == "email").unwrap();
        assert_eq!(email.column.as_deref(), Some("Email"));
        assert_eq!(email.filled_percent, 50.0);
        let nip = summary.iter().find(|s| s.field == "nip").unwrap();
        assert_eq!(nip.column, None);
    }
}
