//! Materialized row view

use std::collections::BTreeMap;

use serde::Serialize;

use super::mapping::SemanticField;

/// Key of the computed days-overdue value in template contexts
pub const DAYS_OVERDUE_KEY: &str = "dni_po_terminie";

/// One materialized row: semantic field -> normalized text, plus the
/// computed days overdue
///
/// A view recomputed on demand from the table and mapping; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SemanticRecord {
    /// Position of the source row in the table
    pub row_index: usize,
    pub values: BTreeMap<String, String>,
    /// Days past the payment term, clamped to zero
    pub dni_po_terminie: i64,
    /// False when the invoice date was missing or unparseable, in which
    /// case `dni_po_terminie` is 0 but means "unknown"
    pub invoice_date_parsed: bool,
}

impl SemanticRecord {
    /// Field value, or empty string when the field is not present
    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(|s| s.as_str()).unwrap_or("")
    }

    pub fn field(&self, field: SemanticField) -> &str {
        self.get(field.as_str())
    }

    /// Values available to template placeholders, including the computed
    /// days overdue
    pub fn template_context(&self) -> BTreeMap<String, String> {
        let mut ctx = self.values.clone();
        ctx.insert(DAYS_OVERDUE_KEY.to_string(), self.dni_po_terminie.to_string());
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_context_includes_days_overdue() {
        let mut values = BTreeMap::new();
        values.insert("kontrahent".to_string(), "Acme".to_string());
        let record = SemanticRecord {
            row_index: 0,
            values,
            dni_po_terminie: 12,
            invoice_date_parsed: true,
        };
        let ctx = record.template_context();
        assert_eq!(ctx.get("dni_po_terminie").map(String::as_str), Some("12"));
        assert_eq!(record.field(SemanticField::Kontrahent), "Acme");
        assert_eq!(record.get("email"), "");
    }
}
