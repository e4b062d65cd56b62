//! Ingestion - read a spreadsheet or delimited text file of unknown shape
//!
//! Workbooks go through calamine. Delimited text first runs a detection pass
//! (encoding, then separator), parses with the detected pair, then walks a
//! list of fallback hypotheses and finally splits lines by hand. Individual
//! attempt failures are logged at debug level and never surface; the caller
//! only sees `UnreadableFile` or `EmptyData` once every attempt is exhausted.

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{open_workbook, open_workbook_auto, Data, Range, Reader, Xls, Xlsx};
use encoding_rs::Encoding;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::result::{Error, Result};
use crate::domain::{Cell, RawTable};

/// File families recognised by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Spreadsheet,
    Delimited,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(FileKind::Spreadsheet),
            "csv" | "tsv" | "txt" => Ok(FileKind::Delimited),
            "" => Err(Error::UnsupportedFormat(format!(
                "{} has no file extension",
                path.display()
            ))),
            other => Err(Error::UnsupportedFormat(format!(".{}", other))),
        }
    }
}

/// Text encodings tried for delimited files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextEncoding {
    Utf16Le,
    Utf16Be,
    Utf8,
    Windows1250,
    Iso8859_2,
    Latin1,
}

impl TextEncoding {
    /// Detection order: UTF-16 first, then UTF-8, then the single-byte
    /// Central European code pages
    pub const DETECTION_ORDER: [TextEncoding; 6] = [
        TextEncoding::Utf16Le,
        TextEncoding::Utf16Be,
        TextEncoding::Utf8,
        TextEncoding::Windows1250,
        TextEncoding::Iso8859_2,
        TextEncoding::Latin1,
    ];

    pub fn encoding(&self) -> &'static Encoding {
        match self {
            TextEncoding::Utf16Le => encoding_rs::UTF_16LE,
            TextEncoding::Utf16Be => encoding_rs::UTF_16BE,
            TextEncoding::Utf8 => encoding_rs::UTF_8,
            TextEncoding::Windows1250 => encoding_rs::WINDOWS_1250,
            TextEncoding::Iso8859_2 => encoding_rs::ISO_8859_2,
            // encoding_rs follows WHATWG, where latin-1 is windows-1252
            TextEncoding::Latin1 => encoding_rs::WINDOWS_1252,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf16Le => "utf-16-le",
            TextEncoding::Utf16Be => "utf-16-be",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Windows1250 => "windows-1250",
            TextEncoding::Iso8859_2 => "iso-8859-2",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    fn from_bom(bytes: &[u8]) -> Option<(TextEncoding, usize)> {
        let (encoding, len) = Encoding::for_bom(bytes)?;
        let detected = if encoding == encoding_rs::UTF_8 {
            TextEncoding::Utf8
        } else if encoding == encoding_rs::UTF_16LE {
            TextEncoding::Utf16Le
        } else {
            TextEncoding::Utf16Be
        };
        Some((detected, len))
    }

    /// Decode the whole buffer, failing on any malformed sequence
    fn decode_strict<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        let body = match TextEncoding::from_bom(bytes) {
            Some((bom, len)) if bom == *self => &bytes[len..],
            _ => bytes,
        };
        self.encoding()
            .decode_without_bom_handling_and_without_replacement(body)
    }

    /// Decode with replacement characters for malformed input
    fn decode_lossy<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let (text, _, _) = self.encoding().decode(bytes);
        text
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which delimited-text attempt produced the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    Detected,
    Fallback,
    ManualSplit,
}

/// Description of how a file was read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceFormat {
    Spreadsheet {
        engine: String,
        sheet: String,
    },
    Delimited {
        encoding: TextEncoding,
        separator: char,
        strategy: ParseStrategy,
    },
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Spreadsheet { engine, sheet } => {
                write!(f, "spreadsheet ({}, sheet '{}')", engine, sheet)
            }
            SourceFormat::Delimited {
                encoding,
                separator,
                strategy,
            } => write!(
                f,
                "delimited text ({}, separator {:?}, {:?})",
                encoding, separator, strategy
            ),
        }
    }
}

/// A freshly ingested table and how it was read
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: RawTable,
    pub source: SourceFormat,
}

/// Result of the detection pass over a delimited file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub encoding: TextEncoding,
    pub separator: u8,
    /// Header fields on the first line under `separator`
    pub header_width: usize,
}

/// Candidate separators, scored by the column count they yield
pub const SEPARATORS: [u8; 4] = [b'\t', b';', b',', b'|'];

const DEFAULT_SEPARATOR: u8 = b';';

/// Reads a worksheet (first, or named) with one calamine engine
type EngineFn = fn(&Path, Option<&str>) -> std::result::Result<(String, Range<Data>), String>;

/// Load a file, picking the first sheet of a workbook
pub fn load(path: &Path) -> Result<LoadedTable> {
    match FileKind::from_path(path)? {
        FileKind::Spreadsheet => load_workbook(path, None),
        FileKind::Delimited => {
            let bytes = std::fs::read(path)
                .map_err(|e| Error::unreadable(format!("{}: {}", path.display(), e)))?;
            load_delimited(&bytes)
        }
    }
}

/// Load a named worksheet; delimited files have a single implicit sheet
pub fn load_sheet(path: &Path, sheet: &str) -> Result<LoadedTable> {
    match FileKind::from_path(path)? {
        FileKind::Spreadsheet => load_workbook(path, Some(sheet)),
        FileKind::Delimited => load(path),
    }
}

/// Sheet names of a workbook (empty for delimited text)
pub fn list_sheets(path: &Path) -> Result<Vec<String>> {
    match FileKind::from_path(path)? {
        FileKind::Spreadsheet => {
            let workbook = open_workbook_auto(path)
                .map_err(|e| Error::unreadable(format!("{}: {}", path.display(), e)))?;
            Ok(workbook.sheet_names())
        }
        FileKind::Delimited => Ok(Vec::new()),
    }
}

// === Spreadsheets ===

fn load_workbook(path: &Path, sheet: Option<&str>) -> Result<LoadedTable> {
    let engines: [(&str, EngineFn); 2] = [
        ("xlsx", read_with::<Xlsx<BufReader<File>>>),
        ("xls", read_with::<Xls<BufReader<File>>>),
    ];

    let mut saw_empty = false;
    for (engine, read) in engines {
        match read(path, sheet) {
            Ok((name, range)) => match range_to_table(&range) {
                Some(table) => return Ok(spreadsheet_result(table, engine, name)),
                None => {
                    debug!(engine, sheet = %name, "sheet parsed but empty");
                    saw_empty = true;
                }
            },
            Err(e) => debug!(engine, error = %e, "spreadsheet engine failed"),
        }
    }

    // Last resort: let calamine sniff the container and take the first
    // (or requested) sheet
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::unreadable(format!("{}: {}", path.display(), e)))?;
    let names = workbook.sheet_names();
    let name = match sheet {
        Some(requested) => names
            .iter()
            .find(|n| n.as_str() == requested)
            .cloned()
            .ok_or_else(|| Error::unreadable(format!("no sheet named '{}'", requested)))?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| Error::unreadable(format!("{} contains no sheets", path.display())))?,
    };
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| Error::unreadable(format!("sheet '{}': {}", name, e)))?;

    match range_to_table(&range) {
        Some(table) => Ok(spreadsheet_result(table, "auto", name)),
        None if saw_empty || range.is_empty() => {
            Err(Error::empty(format!("sheet '{}' has no data rows", name)))
        }
        None => Err(Error::empty(format!("sheet '{}' has no usable columns", name))),
    }
}

fn read_with<R>(path: &Path, sheet: Option<&str>) -> std::result::Result<(String, Range<Data>), String>
where
    R: Reader<BufReader<File>>,
{
    let mut workbook: R = open_workbook(path).map_err(|e| format!("{:?}", e))?;
    let name = match sheet {
        Some(s) => s.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| "no sheets".to_string())?,
    };
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| format!("{:?}", e))?;
    Ok((name, range))
}

fn spreadsheet_result(table: RawTable, engine: &str, sheet: String) -> LoadedTable {
    info!(
        engine,
        sheet = %sheet,
        rows = table.row_count(),
        columns = table.column_count(),
        "workbook loaded"
    );
    LoadedTable {
        table,
        source: SourceFormat::Spreadsheet {
            engine: engine.to_string(),
            sheet,
        },
    }
}

/// First row is the header; `None` when no data rows or columns remain
fn range_to_table(range: &Range<Data>) -> Option<RawTable> {
    let mut rows = range.rows();
    let header = rows.next()?;
    let columns = header_names(header.iter().map(stringify_cell));
    let data: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(stringify_cell).collect())
        .collect();
    finish_table(columns, data)
}

/// Render a workbook cell as text
///
/// Whole floats print without a fractional part; dates print as ISO dates,
/// with a time component only when one is present.
pub fn stringify_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            if s.is_empty() {
                None
            } else {
                Some(s.clone())
            }
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Some(format!("{}", *f as i64))
            } else {
                Some(f.to_string())
            }
        }
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => {
                if value.time() == chrono::NaiveTime::MIN {
                    Some(value.format("%Y-%m-%d").to_string())
                } else {
                    Some(value.format("%Y-%m-%d %H:%M:%S").to_string())
                }
            }
            None => Some(dt.as_f64().to_string()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

// === Delimited text ===

/// Parse a delimited text file held in memory
pub fn load_delimited(bytes: &[u8]) -> Result<LoadedTable> {
    let detection = detect_format(bytes);
    let mut saw_empty = false;

    if let Some(det) = detection {
        debug!(encoding = %det.encoding, separator = %(det.separator as char), "detected format");
        match try_parse(bytes, det.encoding, det.separator, true) {
            Attempt::Parsed(table) => {
                return Ok(delimited_result(table, det.encoding, det.separator, ParseStrategy::Detected))
            }
            Attempt::Empty => saw_empty = true,
            Attempt::Failed(e) => debug!(error = %e, "detected format failed to parse"),
        }
    }

    // A hypothesis that sees fewer columns than the detected header is
    // reading the wrong separator
    let min_columns = detection.map_or(0, |d| d.header_width);
    for (encoding, separator, quoting) in fallback_attempts(detection) {
        match try_parse(bytes, encoding, separator, quoting) {
            Attempt::Parsed(table) if table.column_count() < min_columns => debug!(
                encoding = %encoding,
                separator = %(separator as char),
                columns = table.column_count(),
                min_columns,
                "fallback attempt rejected, too few columns"
            ),
            Attempt::Parsed(table) => {
                return Ok(delimited_result(table, encoding, separator, ParseStrategy::Fallback))
            }
            Attempt::Empty => saw_empty = true,
            Attempt::Failed(e) => debug!(
                encoding = %encoding,
                separator = %(separator as char),
                quoting,
                error = %e,
                "fallback attempt failed"
            ),
        }
    }

    let (encoding, separator) = detection
        .map(|d| (d.encoding, d.separator))
        .unwrap_or((TextEncoding::Utf8, DEFAULT_SEPARATOR));
    let text = encoding.decode_lossy(bytes);
    let (columns, rows) = manual_split(&text, separator);
    match finish_table(columns, rows) {
        Some(table) => {
            debug!("manual line split succeeded");
            Ok(delimited_result(table, encoding, separator, ParseStrategy::ManualSplit))
        }
        None if saw_empty || !text.trim().is_empty() => {
            Err(Error::empty("file contains no data rows"))
        }
        None => Err(Error::empty("file is empty")),
    }
}

/// Detect encoding and separator from the first line
///
/// Returns `None` when no encoding yields a plausible first line.
pub fn detect_format(bytes: &[u8]) -> Option<Detection> {
    let (encoding, text) = detect_encoding(bytes)?;
    let first_line = first_line(&text);
    let separator = detect_separator(first_line);
    Some(Detection {
        encoding,
        separator,
        header_width: split_quoted(first_line, separator).len(),
    })
}

fn detect_encoding(bytes: &[u8]) -> Option<(TextEncoding, Cow<'_, str>)> {
    if let Some((encoding, _)) = TextEncoding::from_bom(bytes) {
        if let Some(text) = encoding.decode_strict(bytes) {
            return Some((encoding, text));
        }
    }
    TextEncoding::DETECTION_ORDER.iter().find_map(|&encoding| {
        let text = encoding.decode_strict(bytes)?;
        if is_plausible_line(first_line(&text)) {
            Some((encoding, text))
        } else {
            debug!(encoding = %encoding, "first line not plausible");
            None
        }
    })
}

fn first_line(text: &str) -> &str {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim_start_matches('\u{FEFF}')
}

/// A header line decoded with the right encoding is non-empty, free of
/// control characters and mostly Latin script
fn is_plausible_line(line: &str) -> bool {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return false;
    }
    let mut total = 0usize;
    let mut latin = 0usize;
    for c in line.chars() {
        if c.is_control() && c != '\t' {
            return false;
        }
        total += 1;
        if (c as u32) <= 0x024F || ('\u{2010}'..='\u{20AC}').contains(&c) {
            latin += 1;
        }
    }
    latin * 10 >= total * 8
}

/// Pick the separator giving the most columns on `line`; ties and lines
/// that split on nothing fall back to semicolon
pub fn detect_separator(line: &str) -> u8 {
    let scores: Vec<(u8, usize)> = SEPARATORS
        .iter()
        .map(|&sep| (sep, split_quoted(line, sep).len()))
        .collect();
    let best = scores.iter().map(|(_, n)| *n).max().unwrap_or(0);
    if best <= 1 {
        return DEFAULT_SEPARATOR;
    }
    let winners: Vec<u8> = scores
        .iter()
        .filter(|(_, n)| *n == best)
        .map(|(s, _)| *s)
        .collect();
    match winners.as_slice() {
        [only] => *only,
        _ => DEFAULT_SEPARATOR,
    }
}

/// Ordered (encoding, separator, quoting) hypotheses after detection fails
fn fallback_attempts(detection: Option<Detection>) -> Vec<(TextEncoding, u8, bool)> {
    use TextEncoding::*;

    let mut attempts = vec![
        (Utf8, b';', true),
        (Utf8, b',', true),
        (Windows1250, b';', true),
        (Windows1250, b',', true),
        (Iso8859_2, b';', true),
        (Latin1, b';', true),
        (Utf16Le, b'\t', true),
        (Utf8, b'\t', true),
    ];
    if let Some(det) = detection {
        attempts.retain(|&(e, s, _)| !(e == det.encoding && s == det.separator));
        attempts.push((det.encoding, det.separator, false));
    }
    attempts.push((Windows1250, b';', false));
    attempts
}

enum Attempt {
    Parsed(RawTable),
    Empty,
    Failed(String),
}

fn try_parse(bytes: &[u8], encoding: TextEncoding, separator: u8, quoting: bool) -> Attempt {
    let text = match encoding.decode_strict(bytes) {
        Some(text) => text,
        None => return Attempt::Failed(format!("not valid {}", encoding)),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(false)
        .flexible(true)
        .quoting(quoting)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(Ok(record)) => record,
        Some(Err(e)) => return Attempt::Failed(e.to_string()),
        None => return Attempt::Empty,
    };
    let columns = header_names(header.iter().map(|h| non_empty(h)));
    let width = columns.len();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in records {
        match result {
            // Trailing separators leave empty cells past the header
            Ok(record) if record.iter().skip(width).all(|c| c.trim().is_empty()) => {
                rows.push(record.iter().take(width).map(non_empty).collect::<Vec<Cell>>());
            }
            Ok(_) => skipped += 1,
            Err(e) => {
                debug!(error = %e, "skipping malformed line");
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        debug!(skipped, "lines skipped while parsing");
    }

    match finish_table(columns, rows) {
        Some(table) => Attempt::Parsed(table),
        None => Attempt::Empty,
    }
}

fn delimited_result(
    table: RawTable,
    encoding: TextEncoding,
    separator: u8,
    strategy: ParseStrategy,
) -> LoadedTable {
    info!(
        encoding = %encoding,
        separator = %(separator as char),
        ?strategy,
        rows = table.row_count(),
        columns = table.column_count(),
        "delimited file loaded"
    );
    LoadedTable {
        table,
        source: SourceFormat::Delimited {
            encoding,
            separator: separator as char,
            strategy,
        },
    }
}

/// Split every non-blank line on `separator`, honouring double quotes
fn manual_split(text: &str, separator: u8) -> (Vec<String>, Vec<Vec<Cell>>) {
    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty());
    let columns = match lines.next() {
        Some(header) => header_names(split_quoted(header, separator).into_iter().map(|h| non_empty(&h))),
        None => return (Vec::new(), Vec::new()),
    };
    let width = columns.len();
    let rows = lines
        .map(|line| {
            let mut cells: Vec<Cell> = split_quoted(line, separator)
                .into_iter()
                .map(|c| non_empty(&c))
                .collect();
            cells.resize(width, None);
            cells
        })
        .collect();
    (columns, rows)
}

/// Split one line on `separator`, treating quoted regions as opaque
///
/// Quotes are kept in the output; cleaning strips them later.
pub fn split_quoted(line: &str, separator: u8) -> Vec<String> {
    let sep = separator as char;
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            current.push(c);
        } else if c == sep && !in_quotes {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    fields
}

fn non_empty(value: &str) -> Cell {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Header cells become column names; blanks get positional names
fn header_names<I>(cells: I) -> Vec<String>
where
    I: Iterator<Item = Cell>,
{
    cells
        .enumerate()
        .map(|(i, cell)| cell.unwrap_or_else(|| format!("Unnamed: {}", i)))
        .collect()
}

fn finish_table(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Option<RawTable> {
    if columns.is_empty() || rows.is_empty() {
        return None;
    }
    let mut table = RawTable::new(columns, rows);
    table.dedupe_columns();
    Some(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn test_file_kind_by_extension() {
        assert_eq!(FileKind::from_path(Path::new("a.XLSX")).unwrap(), FileKind::Spreadsheet);
        assert_eq!(FileKind::from_path(Path::new("a.csv")).unwrap(), FileKind::Delimited);
        assert!(matches!(
            FileKind::from_path(Path::new("a.pdf")),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_detect_utf16le_tab_separated() {
        let bytes = utf16le("Kontrahent\tNIP\tEmail\r\nAcme\t1234567890\ta@b.pl\r\n");
        let det = detect_format(&bytes).unwrap();
        assert_eq!(det.encoding, TextEncoding::Utf16Le);
        assert_eq!(det.encoding.label(), "utf-16-le");
        assert_eq!(det.separator, b'\t');
    }

    #[test]
    fn test_detect_windows1250() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1250.encode("Kontrahent;Kwota płatności\nŁódź;1,00\n");
        let det = detect_format(&bytes).unwrap();
        assert_eq!(det.encoding, TextEncoding::Windows1250);
        assert_eq!(det.separator, b';');
    }

    #[test]
    fn test_detect_separator_scores_and_ties() {
        assert_eq!(detect_separator("a,b,c"), b',');
        assert_eq!(detect_separator("a|b|c|d"), b'|');
        assert_eq!(detect_separator("a;b,c"), b';');
        assert_eq!(detect_separator("single"), b';');
        assert_eq!(detect_separator("\"x;y\",z"), b',');
    }

    #[test]
    fn test_load_delimited_skips_overlong_rows_and_pads_short() {
        let bytes = b"a;b;c\n1;2;3\n1;2;3;4\n5\n";
        let loaded = load_delimited(bytes).unwrap();
        assert_eq!(loaded.table.row_count(), 2);
        assert_eq!(loaded.table.cell(1, "a"), Some("5"));
        assert_eq!(loaded.table.cell(1, "c"), None);
        assert!(matches!(
            loaded.source,
            SourceFormat::Delimited { strategy: ParseStrategy::Detected, .. }
        ));
    }

    #[test]
    fn test_trailing_separator_on_data_rows() {
        let loaded = load_delimited(b"Kontrahent;Kwota\nAcme;100,00;\nBeta;50,00;\n").unwrap();
        assert_eq!(loaded.table.columns(), &["Kontrahent", "Kwota"]);
        assert_eq!(loaded.table.row_count(), 2);
        assert_eq!(loaded.table.cell(1, "Kwota"), Some("50,00"));
        assert_eq!(
            loaded.source,
            SourceFormat::Delimited {
                encoding: TextEncoding::Utf8,
                separator: ';',
                strategy: ParseStrategy::Detected,
            }
        );
    }

    #[test]
    fn test_unreadable_header_line_uses_fallback() {
        // A form feed left by a report printer makes the first line implausible
        // under every encoding, so detection gives up
        let bytes = b"\x0cKontrahent;Kwota\nAcme;100,00\n";
        assert_eq!(detect_format(bytes), None);

        let loaded = load_delimited(bytes).unwrap();
        assert_eq!(loaded.table.columns(), &["\u{c}Kontrahent", "Kwota"]);
        assert_eq!(loaded.table.cell(0, "Kwota"), Some("100,00"));
        assert_eq!(
            loaded.source,
            SourceFormat::Delimited {
                encoding: TextEncoding::Utf8,
                separator: ';',
                strategy: ParseStrategy::Fallback,
            }
        );
    }

    #[test]
    fn test_overlong_rows_everywhere_use_manual_split() {
        let loaded = load_delimited(b"a;b\n1;2;3\n4;5;6\n").unwrap();
        assert_eq!(loaded.table.columns(), &["a", "b"]);
        assert_eq!(loaded.table.row_count(), 2);
        assert_eq!(loaded.table.cell(1, "b"), Some("5"));
        assert!(matches!(
            loaded.source,
            SourceFormat::Delimited { strategy: ParseStrategy::ManualSplit, separator: ';', .. }
        ));
    }

    #[test]
    fn test_detection_reports_header_width() {
        let det = detect_format(b"a;b;\"c;d\"\n1;2;3\n").unwrap();
        assert_eq!(det.separator, b';');
        assert_eq!(det.header_width, 3);
    }

    #[test]
    fn test_header_only_file_is_empty_data() {
        let err = load_delimited(b"a;b;c\n").unwrap_err();
        assert!(matches!(err, Error::EmptyData(_)));
        let err = load_delimited(b"").unwrap_err();
        assert!(matches!(err, Error::EmptyData(_)));
    }

    #[test]
    fn test_unclosed_quote_still_loads() {
        let bytes = b"a;b\n\"x;1\n2;3\n";
        let loaded = load_delimited(bytes).unwrap();
        assert!(loaded.table.row_count() >= 1);
    }

    #[test]
    fn test_split_quoted_keeps_separator_inside_quotes() {
        assert_eq!(split_quoted("\"a;b\";c", b';'), vec!["\"a;b\"", "c"]);
    }

    #[test]
    fn test_blank_and_duplicate_headers() {
        let loaded = load_delimited(b"a;;a\n1;2;3\n").unwrap();
        assert_eq!(loaded.table.columns(), &["a", "Unnamed: 1", "a.1"]);
    }

    #[test]
    fn test_stringify_cell() {
        assert_eq!(stringify_cell(&Data::Float(1000.0)), Some("1000".to_string()));
        assert_eq!(stringify_cell(&Data::Float(12.5)), Some("12.5".to_string()));
        assert_eq!(stringify_cell(&Data::Int(7)), Some("7".to_string()));
        assert_eq!(stringify_cell(&Data::Empty), None);
        assert_eq!(stringify_cell(&Data::String(String::new())), None);
    }

    #[test]
    fn test_load_missing_file_is_unreadable() {
        let err = load(Path::new("/nonexistent/dir/file.csv")).unwrap_err();
        assert!(matches!(err, Error::UnreadableFile(_)));
    }
}
