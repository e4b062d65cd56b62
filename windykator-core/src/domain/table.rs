//! In-memory table produced by ingestion

use serde::Serialize;

/// A single cell: text, or missing
pub type Cell = Option<String>;

/// Ordered, named columns of string-or-missing cells
///
/// Stored row-major; every row always has exactly one cell per column.
/// Row positions are contiguous (removing rows shifts later rows up).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Build a table, padding short rows with missing cells and truncating
    /// long ones to the header width
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Convenience constructor for literal tables (tests, fixtures)
    pub fn from_strings(columns: &[&str], rows: &[&[&str]]) -> Self {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| {
                    r.iter()
                        .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
                        .collect()
                })
                .collect(),
        )
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// Position of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// Cell text by row index and column name; `None` when missing
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Iterate one column's cells top to bottom
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).and_then(|c| c.as_deref()))
    }

    /// Replace every cell of a column through `f`
    pub fn map_column<F>(&mut self, index: usize, mut f: F)
    where
        F: FnMut(Option<&str>) -> Cell,
    {
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(index) {
                *cell = f(cell.as_deref());
            }
        }
    }

    pub fn rename_columns<F>(&mut self, f: F)
    where
        F: FnMut(&String) -> String,
    {
        self.columns = self.columns.iter().map(f).collect();
    }

    /// Make column names unique by suffixing repeats with `.1`, `.2`, ...
    pub fn dedupe_columns(&mut self) {
        let mut seen: Vec<String> = Vec::with_capacity(self.columns.len());
        for name in &mut self.columns {
            if seen.contains(name) {
                let mut n = 1;
                while seen.contains(&format!("{}.{}", name, n)) {
                    n += 1;
                }
                *name = format!("{}.{}", name, n);
            }
            seen.push(name.clone());
        }
    }

    /// Keep only columns for which `keep(index)` holds
    pub fn retain_columns<F>(&mut self, mut keep: F)
    where
        F: FnMut(usize) -> bool,
    {
        let kept: Vec<usize> = (0..self.columns.len()).filter(|&i| keep(i)).collect();
        if kept.len() == self.columns.len() {
            return;
        }
        self.columns = kept.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            let narrowed: Vec<Cell> = kept.iter().map(|&i| row[i].take()).collect();
            *row = narrowed;
        }
    }

    /// Keep only rows for which `keep(row)` holds; returns how many were removed
    pub fn retain_rows<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&[Cell]) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|row| keep(row));
        before - self.rows.len()
    }

    /// Keep rows whose flag in `keep` is set; rows past the end of `keep`
    /// stay. Returns how many were removed
    pub fn retain_marked(&mut self, keep: &[bool]) -> usize {
        let mut flags = keep.iter().copied();
        self.retain_rows(|_| flags.next().unwrap_or(true))
    }
}

/// A cell counts as empty when missing or blank
pub fn is_blank(cell: Option<&str>) -> bool {
    cell.map_or(true, |s| s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pads_and_truncates_rows() {
        let table = RawTable::new(
            vec!["a".into(), "b".into()],
            vec![
                vec![Some("1".into())],
                vec![Some("1".into()), Some("2".into()), Some("3".into())],
            ],
        );
        assert_eq!(table.row(0).unwrap(), &[Some("1".to_string()), None]);
        assert_eq!(table.row(1).unwrap().len(), 2);
    }

    #[test]
    fn test_cell_lookup_by_name() {
        let table = RawTable::from_strings(&["Kontrahent", "NIP"], &[&["Acme", ""]]);
        assert_eq!(table.cell(0, "Kontrahent"), Some("Acme"));
        assert_eq!(table.cell(0, "NIP"), None);
        assert_eq!(table.cell(0, "Missing"), None);
        assert_eq!(table.cell(5, "Kontrahent"), None);
    }

    #[test]
    fn test_retain_columns_keeps_rows_aligned() {
        let mut table = RawTable::from_strings(&["a", "b", "c"], &[&["1", "2", "3"]]);
        table.retain_columns(|i| i != 1);
        assert_eq!(table.columns(), &["a".to_string(), "c".to_string()]);
        assert_eq!(table.cell(0, "c"), Some("3"));
    }

    #[test]
    fn test_dedupe_columns() {
        let mut table = RawTable::from_strings(&["a", "a", "b", "a"], &[]);
        table.dedupe_columns();
        assert_eq!(table.columns(), &["a", "a.1", "b", "a.2"]);
    }

    #[test]
    fn test_retain_rows_reports_removed() {
        let mut table = RawTable::from_strings(&["a"], &[&["1"], &["2"], &["3"]]);
        let removed = table.retain_rows(|row| row[0].as_deref() != Some("2"));
        assert_eq!(removed, 1);
        assert_eq!(table.cell(1, "a"), Some("3"));
    }

    #[test]
    fn test_retain_marked_follows_flags() {
        let mut table = RawTable::from_strings(&["a"], &[&["1"], &["2"], &["3"]]);
        assert_eq!(table.retain_marked(&[false, true]), 1);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, "a"), Some("2"));
        assert_eq!(table.cell(1, "a"), Some("3"));
    }
}
