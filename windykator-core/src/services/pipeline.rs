//! Pipeline - owns one loaded table and its mapping
//!
//! Loading chains ingest, clean, auto-map and the zero-amount filter. The
//! cleaned table is kept untouched; normalization always runs on a copy of
//! it for the current mapping, so remapping never damages source cells.
//! A new load always discards the previous tables and mapping. Front ends
//! get copies (`snapshot`) or shared borrows, never a live handle they could
//! mutate behind the pipeline's back.

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{ColumnMapping, RawTable, SemanticField, SemanticRecord};

use super::column_mapping::{self, FieldSummary};
use super::ingest::{self, LoadedTable, SourceFormat};
use super::{cleaning, materialize};

/// What happened while loading a file
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub source: SourceFormat,
    pub rows: usize,
    pub columns: usize,
    pub dropped_columns: Vec<String>,
    pub dropped_rows: usize,
    pub zero_amount_rows: usize,
    pub mapped_fields: usize,
}

/// Single-session ingestion pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Cleaned and filtered, never normalized
    cleaned: Option<RawTable>,
    /// `cleaned` normalized under `mapping`
    table: Option<RawTable>,
    source: Option<SourceFormat>,
    mapping: ColumnMapping,
    payment_term_days: i64,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(materialize::DEFAULT_PAYMENT_TERM_DAYS)
    }
}

impl Pipeline {
    pub fn new(payment_term_days: i64) -> Self {
        Self {
            cleaned: None,
            table: None,
            source: None,
            mapping: ColumnMapping::new(),
            payment_term_days,
        }
    }

    // === Loading ===

    /// Load a file (first sheet of a workbook)
    pub fn load(&mut self, path: &Path) -> Result<LoadSummary> {
        self.discard();
        let loaded = ingest::load(path)?;
        self.accept(loaded)
    }

    /// Load a named worksheet
    pub fn load_sheet(&mut self, path: &Path, sheet: &str) -> Result<LoadSummary> {
        self.discard();
        let loaded = ingest::load_sheet(path, sheet)?;
        self.accept(loaded)
    }

    /// Load delimited text already in memory (e.g. an uploaded form field)
    pub fn load_delimited_bytes(&mut self, bytes: &[u8]) -> Result<LoadSummary> {
        self.discard();
        let loaded = ingest::load_delimited(bytes)?;
        self.accept(loaded)
    }

    /// Sheet names of a workbook (empty for delimited text)
    pub fn list_sheets(path: &Path) -> Result<Vec<String>> {
        ingest::list_sheets(path)
    }

    fn discard(&mut self) {
        self.cleaned = None;
        self.table = None;
        self.source = None;
        self.mapping = ColumnMapping::new();
    }

    fn accept(&mut self, loaded: LoadedTable) -> Result<LoadSummary> {
        let LoadedTable { mut table, source } = loaded;

        let report = cleaning::clean(&mut table);
        if table.is_empty() {
            return Err(Error::empty("no non-empty rows or columns after cleaning"));
        }

        let mut mapping = column_mapping::auto_map(&table);
        mapping.retain_existing(&table);
        let zero_amount_rows = cleaning::remove_zero_amounts(&mut table, Some(&mapping));
        if table.row_count() == 0 {
            warn!("every row has a zero or blank amount");
        }

        let summary = LoadSummary {
            source: source.clone(),
            rows: table.row_count(),
            columns: table.column_count(),
            dropped_columns: report.dropped_columns,
            dropped_rows: report.dropped_rows,
            zero_amount_rows,
            mapped_fields: mapping.len(),
        };
        info!(rows = summary.rows, columns = summary.columns, "file ready");

        self.cleaned = Some(table);
        self.source = Some(source);
        self.mapping = mapping;
        self.renormalize();
        Ok(summary)
    }

    // === Accessors ===

    pub fn is_loaded(&self) -> bool {
        self.table.is_some()
    }

    pub fn table(&self) -> Option<&RawTable> {
        self.table.as_ref()
    }

    /// Independent copy of the current table
    pub fn snapshot(&self) -> Option<RawTable> {
        self.table.clone()
    }

    pub fn source(&self) -> Option<&SourceFormat> {
        self.source.as_ref()
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn payment_term_days(&self) -> i64 {
        self.payment_term_days
    }

    fn loaded_table(&self) -> Result<&RawTable> {
        self.cleaned
            .as_ref()
            .ok_or_else(|| Error::validation("no file loaded"))
    }

    // === Mapping ===

    /// Replace the whole mapping; every column must exist in the table
    pub fn set_mapping(&mut self, mapping: ColumnMapping) -> Result<()> {
        let table = self.loaded_table()?;
        let unknown: Vec<&str> = mapping
            .iter()
            .filter(|(_, col)| !col.is_empty() && !table.has_column(col))
            .map(|(_, col)| col)
            .collect();
        if !unknown.is_empty() {
            return Err(Error::validation(format!("unknown column(s): {}", unknown.join(", "))));
        }
        self.mapping = mapping;
        self.renormalize();
        Ok(())
    }

    /// Point one field at a column, keeping the rest of the mapping
    pub fn force_mapping(&mut self, field: &str, column: &str) -> Result<()> {
        let table = self.loaded_table()?;
        if !table.has_column(column) {
            return Err(Error::validation(format!("unknown column: {}", column)));
        }
        self.mapping.insert(field, column);
        self.renormalize();
        Ok(())
    }

    /// Throw away manual changes and recompute the automatic mapping
    pub fn reset_mapping(&mut self) -> Result<()> {
        let table = self.loaded_table()?;
        self.mapping = column_mapping::auto_map(table);
        self.renormalize();
        Ok(())
    }

    /// Apply a previously saved mapping; fields whose column is missing from
    /// this file are dropped and returned
    pub fn apply_saved_mapping(&mut self, mut saved: ColumnMapping) -> Result<Vec<String>> {
        let table = self.loaded_table()?;
        let dropped = saved.retain_existing(table);
        if !dropped.is_empty() {
            warn!(fields = ?dropped, "saved mapping refers to columns missing from this file");
        }
        self.set_mapping(saved)?;
        Ok(dropped)
    }

    /// Rebuild the normalized view from the cleaned table
    fn renormalize(&mut self) {
        let normalized = self.cleaned.clone().map(|mut table| {
            materialize::normalize(&mut table, &self.mapping);
            table
        });
        self.table = normalized;
    }

    /// Required fields that are not mapped
    pub fn validate_mapping(&self, required: &[SemanticField]) -> Vec<SemanticField> {
        column_mapping::validate_mapping(&self.mapping, required)
    }

    /// `MissingMapping` when any required field is unmapped
    pub fn require_mapping(&self, required: &[SemanticField]) -> Result<()> {
        let missing = self.validate_mapping(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingMapping(
                missing.iter().map(|f| f.as_str().to_string()).collect(),
            ))
        }
    }

    /// Mapped fields as a percentage of columns
    pub fn coverage(&self) -> f64 {
        self.table
            .as_ref()
            .map_or(0.0, |t| column_mapping::coverage(t, &self.mapping))
    }

    pub fn unmapped_columns(&self) -> Vec<String> {
        self.table
            .as_ref()
            .map(|t| column_mapping::unmapped_columns(t, &self.mapping))
            .unwrap_or_default()
    }

    pub fn mapping_summary(&self) -> Vec<FieldSummary> {
        self.table
            .as_ref()
            .map(|t| column_mapping::mapping_summary(t, &self.mapping))
            .unwrap_or_default()
    }

    // === Rows ===

    pub fn row_count(&self) -> usize {
        self.table.as_ref().map_or(0, RawTable::row_count)
    }

    /// One record, or `None` when nothing is loaded or the index is out of range
    pub fn materialize(&self, row: usize, today: NaiveDate) -> Option<SemanticRecord> {
        let table = self.table.as_ref()?;
        materialize::materialize(table, &self.mapping, row, today, self.payment_term_days)
    }

    /// Every row, in table order
    pub fn preview_all(&self, today: NaiveDate) -> Vec<SemanticRecord> {
        self.table
            .as_ref()
            .map(|t| materialize::preview_all(t, &self.mapping, today, self.payment_term_days))
            .unwrap_or_default()
    }

    /// Drop settled rows (zero, negative or unparseable amounts)
    pub fn remove_settled_items(&mut self) -> usize {
        let (Some(cleaned), Some(table)) = (self.cleaned.as_mut(), self.table.as_mut()) else {
            return 0;
        };
        let Some(keep) = materialize::outstanding_rows(table, &self.mapping) else {
            warn!("no amount column found, nothing removed");
            return 0;
        };
        cleaned.retain_marked(&keep);
        let removed = table.retain_marked(&keep);
        info!(removed, remaining = table.row_count(), "settled items removed");
        removed
    }

    /// Row indices whose `column` cell contains `term`, ignoring case
    pub fn search_rows(&self, term: &str, column: &str) -> Result<Vec<usize>> {
        let table = self.loaded_table()?;
        let index = table
            .column_index(column)
            .ok_or_else(|| Error::validation(format!("unknown column: {}", column)))?;
        let needle = term.to_lowercase();
        Ok(table
            .column_values(index)
            .enumerate()
            .filter(|(_, cell)| cell.map_or(false, |c| c.to_lowercase().contains(&needle)))
            .map(|(i, _)| i)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn loaded(csv: &str) -> Pipeline {
        let mut pipeline = Pipeline::default();
        pipeline.load_delimited_bytes(csv.as_bytes()).unwrap();
        pipeline
    }

    const SAMPLE: &str = "Kontrahent;Email;Kwota;Data;Uwagi\n\
                          Acme;ACME@example.com;1 000,00;01.01.2024;x\n\
                          Beta;beta@example.com;0;02.01.2024;\n\
                          Gamma;gamma@example.com;250,50;20.01.2024;\n";

    #[test]
    fn test_load_chains_all_stages() {
        let pipeline = loaded(SAMPLE);
        assert_eq!(pipeline.row_count(), 2);
        assert_eq!(pipeline.mapping().get("kwota"), Some("Kwota"));

        let record = pipeline.materialize(0, today()).unwrap();
        assert_eq!(record.get("email"), "acme@example.com");
        assert_eq!(record.get("kwota"), "1000,00");
        assert_eq!(record.dni_po_terminie, 7);
    }

    #[test]
    fn test_new_load_resets_mapping() {
        let mut pipeline = loaded(SAMPLE);
        pipeline.force_mapping("nr_faktury", "Uwagi").unwrap();
        pipeline
            .load_delimited_bytes(b"Firma;Netto\nA;10,00\n")
            .unwrap();
        assert_eq!(pipeline.mapping().get("nr_faktury"), None);
        assert_eq!(pipeline.mapping().get("kontrahent"), Some("Firma"));
    }

    #[test]
    fn test_set_mapping_rejects_unknown_columns() {
        let mut pipeline = loaded(SAMPLE);
        let mut mapping = ColumnMapping::new();
        mapping.insert("kontrahent", "Nope");
        assert!(matches!(pipeline.set_mapping(mapping), Err(Error::Validation(_))));
        assert_eq!(pipeline.mapping().get("kontrahent"), Some("Kontrahent"));
    }

    #[test]
    fn test_set_mapping_replaces_without_merge() {
        let mut pipeline = loaded(SAMPLE);
        let mut mapping = ColumnMapping::new();
        mapping.insert("kontrahent", "Uwagi");
        pipeline.set_mapping(mapping).unwrap();
        assert_eq!(pipeline.mapping().len(), 1);
        assert_eq!(pipeline.materialize(0, today()).unwrap().get("kontrahent"), "x");
    }

    #[test]
    fn test_apply_saved_mapping_drops_missing_columns() {
        let mut pipeline = loaded(SAMPLE);
        let mut saved = ColumnMapping::new();
        saved.insert("kontrahent", "Kontrahent");
        saved.insert("telefon", "Telefon");
        let dropped = pipeline.apply_saved_mapping(saved).unwrap();
        assert_eq!(dropped, vec!["telefon".to_string()]);
        assert_eq!(pipeline.mapping().len(), 1);
    }

    #[test]
    fn test_require_mapping_reports_missing_fields() {
        let pipeline = loaded(SAMPLE);
        let err = pipeline
            .require_mapping(&crate::domain::REQUIRED_FIELDS)
            .unwrap_err();
        match err {
            Error::MissingMapping(fields) => {
                assert_eq!(fields, vec!["nr_faktury".to_string(), "telefon".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_search_rows_is_case_insensitive() {
        let pipeline = loaded(SAMPLE);
        assert_eq!(pipeline.search_rows("GAM", "Kontrahent").unwrap(), vec![1]);
        assert!(pipeline.search_rows("x", "Missing").is_err());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut pipeline = loaded(SAMPLE);
        let snapshot = pipeline.snapshot().unwrap();
        pipeline.remove_settled_items();
        pipeline.force_mapping("nip", "Uwagi").unwrap();
        assert_eq!(snapshot.row_count(), 2);
        assert!(!snapshot.columns().is_empty());
    }

    #[test]
    fn test_remapping_leaves_source_cells_intact() {
        let mut pipeline = loaded("Kontrahent;Email;Kwota\nAcme Sp. z o.o.;Biuro@Acme.pl;100,00\n");
        pipeline.force_mapping("telefon", "Kontrahent").unwrap();
        pipeline.force_mapping("kwota", "Kontrahent").unwrap();
        pipeline.force_mapping("email", "Kontrahent").unwrap();
        pipeline.reset_mapping().unwrap();

        assert_eq!(pipeline.mapping().get("kontrahent"), Some("Kontrahent"));
        assert_eq!(pipeline.mapping().get("kwota"), Some("Kwota"));
        let record = pipeline.materialize(0, today()).unwrap();
        assert_eq!(record.get("kontrahent"), "Acme Sp. z o.o.");
        assert_eq!(record.get("email"), "biuro@acme.pl");
        assert_eq!(record.get("kwota"), "100,00");
    }

    #[test]
    fn test_textual_amount_survives_load() {
        let pipeline = loaded("Kontrahent;Kwota\nAcme;100,00\nBeta;do ustalenia\nGamma;0,00\n");
        assert_eq!(pipeline.row_count(), 2);
        let records = pipeline.preview_all(today());
        assert_eq!(records[0].get("kwota"), "100,00");
        assert_eq!(records[1].get("kontrahent"), "Beta");
    }

    #[test]
    fn test_settled_removal_keeps_views_aligned() {
        let mut pipeline = loaded("Kontrahent;Kwota\nAcme;-5,00\nBeta;20,00\n");
        assert_eq!(pipeline.remove_settled_items(), 1);
        pipeline.reset_mapping().unwrap();
        assert_eq!(pipeline.row_count(), 1);
        assert_eq!(pipeline.materialize(0, today()).unwrap().get("kontrahent"), "Beta");
    }

    #[test]
    fn test_operations_without_file() {
        let mut pipeline = Pipeline::default();
        assert!(pipeline.materialize(0, today()).is_none());
        assert!(pipeline.preview_all(today()).is_empty());
        assert_eq!(pipeline.remove_settled_items(), 0);
        assert!(pipeline.reset_mapping().is_err());
        assert_eq!(pipeline.coverage(), 0.0);
    }
}
