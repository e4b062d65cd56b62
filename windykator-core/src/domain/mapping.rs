//! Semantic fields and the column mapping

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::result::Error;
use super::table::RawTable;

/// The fixed business concepts every ingested file must eventually supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticField {
    Kontrahent,
    Nip,
    NrFaktury,
    Email,
    Telefon,
    Kwota,
    DataFaktury,
}

impl SemanticField {
    pub const ALL: [SemanticField; 7] = [
        SemanticField::Kontrahent,
        SemanticField::Nip,
        SemanticField::NrFaktury,
        SemanticField::Email,
        SemanticField::Telefon,
        SemanticField::Kwota,
        SemanticField::DataFaktury,
    ];

    /// Key used in mappings, records and template placeholders
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticField::Kontrahent => "kontrahent",
            SemanticField::Nip => "nip",
            SemanticField::NrFaktury => "nr_faktury",
            SemanticField::Email => "email",
            SemanticField::Telefon => "telefon",
            SemanticField::Kwota => "kwota",
            SemanticField::DataFaktury => "data_faktury",
        }
    }

    /// Human-readable label for front ends
    pub fn label(&self) -> &'static str {
        match self {
            SemanticField::Kontrahent => "Nazwa Kontrahenta",
            SemanticField::Nip => "NIP",
            SemanticField::NrFaktury => "Numer Faktury",
            SemanticField::Email => "Email",
            SemanticField::Telefon => "Telefon",
            SemanticField::Kwota => "Kwota",
            SemanticField::DataFaktury => "Data Faktury",
        }
    }
}

impl fmt::Display for SemanticField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemanticField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| Error::validation(format!("Unknown field: {}", s)))
    }
}

/// Fields that must be mapped before reminders can be generated
pub const REQUIRED_FIELDS: [SemanticField; 5] = [
    SemanticField::Kontrahent,
    SemanticField::NrFaktury,
    SemanticField::Email,
    SemanticField::Telefon,
    SemanticField::Kwota,
];

/// Field name -> physical column name
///
/// Keys are semantic field names (`kontrahent`, ...) plus any detected
/// extra fields (`vat`, `wartosc_brutto`, ...). Not required to be total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    fields: BTreeMap<String, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|s| s.as_str())
    }

    pub fn column_for(&self, field: SemanticField) -> Option<&str> {
        self.get(field.as_str())
    }

    /// Whether the field is mapped to a non-empty column name
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).map_or(false, |c| !c.is_empty())
    }

    /// Set a field, replacing any previous column
    pub fn insert(&mut self, field: impl Into<String>, column: impl Into<String>) {
        self.fields.insert(field.into(), column.into());
    }

    /// Set a field only if it is not mapped yet; returns whether it was set
    pub fn insert_if_absent(&mut self, field: &str, column: &str) -> bool {
        if self.contains(field) {
            return false;
        }
        self.fields.insert(field.to_string(), column.to_string());
        true
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.fields.remove(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether some field already points at `column`
    pub fn maps_column(&self, column: &str) -> bool {
        self.fields.values().any(|c| c == column)
    }

    /// Fields from `required` that are absent or mapped to an empty name
    pub fn missing(&self, required: &[SemanticField]) -> Vec<SemanticField> {
        required
            .iter()
            .copied()
            .filter(|f| !self.contains(f.as_str()))
            .collect()
    }

    /// Drop fields whose column no longer exists in `table`; returns the
    /// dropped field names
    pub fn retain_existing(&mut self, table: &RawTable) -> Vec<String> {
        let stale: Vec<String> = self
            .fields
            .iter()
            .filter(|(_, col)| !table.has_column(col))
            .map(|(field, _)| field.clone())
            .collect();
        for field in &stale {
            self.fields.remove(field);
        }
        stale
    }
}

impl FromIterator<(String, String)> for ColumnMapping {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
