//! End-to-end tests for the ingestion pipeline and dispatch
//!
//! Fixtures are written into temporary directories in the encodings real
//! invoice exports arrive in.
//!
//! Run with: cargo test --test pipeline_tests

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use tempfile::TempDir;

use windykator_core::adapters::{DryRunSender, FileStore};
use windykator_core::domain::result::Error;
use windykator_core::ports::{EmailSender, SettingsStore};
use windykator_core::services::cleaning;
use windykator_core::services::column_mapping::auto_map;
use windykator_core::services::ingest::{self, TextEncoding};
use windykator_core::services::materialize::{self, DEFAULT_PAYMENT_TERM_DAYS};
use windykator_core::services::{Dispatcher, MessageTemplates, Pipeline, SourceFormat};
use windykator_core::{Channel, ColumnMapping, RawTable, TemplateKind, REQUIRED_FIELDS};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

fn write_fixture(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn windows_1250(text: &str) -> Vec<u8> {
    let (bytes, _, had_errors) = encoding_rs::WINDOWS_1250.encode(text);
    assert!(!had_errors);
    bytes.into_owned()
}

fn utf16_le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

const EXPORT_HEADER: &str = "Kontrahent;NIP;Numer;EMAIL;Telefon komorkowy;Netto;Data";

// =============================================================================
// Ingestion
// =============================================================================

#[test]
fn test_windows_1250_export_end_to_end() {
    let dir = TempDir::new().unwrap();
    let content = format!(
        "{}\r\nAcme Sp. z o.o.;1234567890;FV/1/2024;acme@example.com;501234567;1000,00;01.01.2024\r\n\
         Zakład Łódź;987-654-32-10;FV/2/2024;biuro@lodz.pl;600 700 800;250,50;10.01.2024\r\n",
        EXPORT_HEADER
    );
    let path = write_fixture(&dir, "faktury.csv", &windows_1250(&content));

    let mut pipeline = Pipeline::default();
    let summary = pipeline.load(&path).unwrap();

    assert_eq!(summary.rows, 2);
    assert_eq!(summary.columns, 7);
    match &summary.source {
        SourceFormat::Delimited { encoding, separator, .. } => {
            assert_eq!(*encoding, TextEncoding::Windows1250);
            assert_eq!(*separator, ';');
        }
        other => panic!("unexpected source {:?}", other),
    }
    assert!(pipeline.validate_mapping(&REQUIRED_FIELDS).is_empty());

    let record = pipeline.materialize(0, today()).unwrap();
    assert_eq!(record.get("kontrahent"), "Acme Sp. z o.o.");
    assert_eq!(record.get("nip"), "1234567890");
    assert_eq!(record.get("nr_faktury"), "FV/1/2024");
    assert_eq!(record.get("email"), "acme@example.com");
    assert_eq!(record.get("telefon"), "501234567");
    assert_eq!(record.get("kwota"), "1000,00");
    assert_eq!(record.dni_po_terminie, 7);

    let second = pipeline.materialize(1, today()).unwrap();
    assert_eq!(second.get("kontrahent"), "Zakład Łódź");
    assert_eq!(second.get("nip"), "9876543210");
    assert_eq!(second.get("telefon"), "600700800");
    assert_eq!(second.get("kwota"), "250,50");
    assert_eq!(second.dni_po_terminie, 0);

    assert!(pipeline.materialize(2, today()).is_none());
}

#[test]
fn test_utf16_tab_separated_detection() {
    let bytes = utf16_le("Kontrahent\tNIP\tEmail\r\nAcme\t1234567890\ta@b.pl\r\n");
    let detection = ingest::detect_format(&bytes).unwrap();
    assert_eq!(detection.encoding, TextEncoding::Utf16Le);
    assert_eq!(detection.encoding.label(), "utf-16-le");
    assert_eq!(detection.separator, b'\t');

    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "export.txt", &bytes);
    let loaded = ingest::load(&path).unwrap();
    assert_eq!(loaded.table.columns(), &["Kontrahent", "NIP", "Email"]);
    assert_eq!(loaded.table.cell(0, "Email"), Some("a@b.pl"));
}

/// Two sheets: dated invoices first, an archive second
fn write_workbook(path: &Path) {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    let invoices = workbook.add_worksheet();
    invoices.set_name("Faktury").unwrap();
    for (col, header) in ["Kontrahent", "Numer", "Kwota", "Data"].iter().enumerate() {
        invoices.write_string(0, col as u16, *header).unwrap();
    }
    let rows = [("Acme Sp. z o.o.", "FV/1/2024", 1500.5, 5), ("Beta", "FV/2/2024", 250.0, 10)];
    for (i, (name, number, amount, day)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        invoices.write_string(row, 0, *name).unwrap();
        invoices.write_string(row, 1, *number).unwrap();
        invoices.write_number(row, 2, *amount).unwrap();
        let date = ExcelDateTime::from_ymd(2024, 1, *day).unwrap();
        invoices.write_datetime_with_format(row, 3, &date, &date_format).unwrap();
    }

    let archive = workbook.add_worksheet();
    archive.set_name("Archiwum").unwrap();
    archive.write_string(0, 0, "Klient").unwrap();
    archive.write_string(0, 1, "Suma").unwrap();
    archive.write_string(1, 0, "Gamma").unwrap();
    archive.write_number(1, 1, 99.0).unwrap();

    workbook.save(path).unwrap();
}

#[test]
fn test_workbook_first_and_named_sheets() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("faktury.xlsx");
    write_workbook(&path);

    assert_eq!(Pipeline::list_sheets(&path).unwrap(), vec!["Faktury", "Archiwum"]);

    let mut pipeline = Pipeline::default();
    let summary = pipeline.load(&path).unwrap();
    assert_eq!(
        summary.source,
        SourceFormat::Spreadsheet {
            engine: "xlsx".to_string(),
            sheet: "Faktury".to_string(),
        }
    );
    assert_eq!(summary.rows, 2);

    let records = pipeline.preview_all(today());
    assert_eq!(records[0].get("kontrahent"), "Acme Sp. z o.o.");
    assert_eq!(records[0].get("kwota"), "1500,50");
    assert_eq!(records[0].get("data_faktury"), "2024-01-05");
    assert!(records[0].invoice_date_parsed);
    assert_eq!(records[0].dni_po_terminie, 3);
    assert_eq!(records[1].get("kwota"), "250,00");
    assert_eq!(records[1].dni_po_terminie, 0);

    let summary = pipeline.load_sheet(&path, "Archiwum").unwrap();
    assert_eq!(summary.rows, 1);
    assert_eq!(pipeline.mapping().get("kontrahent"), Some("Klient"));
    let record = pipeline.materialize(0, today()).unwrap();
    assert_eq!(record.get("kwota"), "99,00");

    let err = pipeline.load_sheet(&path, "Brak").unwrap_err();
    assert!(matches!(err, Error::UnreadableFile(_)));
    assert!(!pipeline.is_loaded());
}

#[test]
fn test_export_with_trailing_separators() {
    let mut pipeline = Pipeline::default();
    let summary = pipeline
        .load_delimited_bytes(b"Kontrahent;Kwota\nAcme;100,00;\nBeta;50,00;\n")
        .unwrap();
    assert_eq!(summary.columns, 2);
    assert_eq!(pipeline.mapping().get("kwota"), Some("Kwota"));
    let records = pipeline.preview_all(today());
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].get("kwota"), "50,00");
}

#[test]
fn test_unsupported_and_empty_files() {
    let dir = TempDir::new().unwrap();
    let pdf = write_fixture(&dir, "faktura.pdf", b"%PDF");
    assert!(matches!(ingest::load(&pdf), Err(Error::UnsupportedFormat(_))));

    let header_only = write_fixture(&dir, "puste.csv", b"Kontrahent;Kwota\r\n;\r\n");
    let err = Pipeline::default().load(&header_only).unwrap_err();
    assert!(matches!(err, Error::EmptyData(_)));
    assert!(err.is_blocking());
}

#[test]
fn test_new_load_discards_previous_mapping() {
    let mut pipeline = Pipeline::default();
    pipeline
        .load_delimited_bytes("Firma;Kwota\nAcme;10,00\n".as_bytes())
        .unwrap();
    pipeline.force_mapping("email", "Firma").unwrap();
    assert!(pipeline.mapping().contains("email"));

    pipeline
        .load_delimited_bytes("Klient;Suma\nBeta;5,00\n".as_bytes())
        .unwrap();
    assert!(!pipeline.mapping().contains("email"));
    assert_eq!(pipeline.mapping().get("kontrahent"), Some("Klient"));
}

// =============================================================================
// Cleaning and mapping
// =============================================================================

#[test]
fn test_clean_twice_equals_clean_once() {
    let mut table = RawTable::from_strings(
        &[" Kontrahent ", "Puste", "\"Kwota\""],
        &[
            &["\"Acme\"", "", " 10,00 "],
            &["", "", ""],
            &["Beta\u{FFFD}", "  ", "0"],
        ],
    );
    cleaning::clean(&mut table);
    let once = table.clone();
    let report = cleaning::clean(&mut table);

    assert_eq!(table, once);
    assert!(report.dropped_columns.is_empty());
    assert_eq!(report.dropped_rows, 0);
    assert_eq!(table.columns(), &["Kontrahent", "Kwota"]);
    assert_eq!(table.cell(0, "Kontrahent"), Some("Acme"));
    assert_eq!(table.cell(1, "Kontrahent"), Some("Beta"));
}

#[test]
fn test_synonym_order_beats_column_order() {
    let table = RawTable::from_strings(
        &["Firma", "Kontrahent", "Netto", "Kwota"],
        &[&["Acme", "Acme S.A.", "8,13", "10,00"]],
    );
    let mapping = auto_map(&table);
    assert_eq!(mapping.get("kontrahent"), Some("Kontrahent"));
    assert_eq!(mapping.get("kwota"), Some("Kwota"));
    assert!(!mapping.maps_column("Firma"));
    assert!(!mapping.maps_column("Netto"));
}

#[test]
fn test_content_sniffing_fills_unnamed_columns() {
    let table = RawTable::from_strings(
        &["A", "B", "C", "D", "E"],
        &[
            &["1234567890", "jan@kowalski.pl", "501234567", "1 234,56", "05.01.2024"],
            &["", "", "", "99,00", ""],
        ],
    );
    let mapping = auto_map(&table);
    assert_eq!(mapping.get("nip"), Some("A"));
    assert_eq!(mapping.get("email"), Some("B"));
    assert_eq!(mapping.get("telefon"), Some("C"));
    assert_eq!(mapping.get("kwota"), Some("D"));
    assert_eq!(mapping.get("data_faktury"), Some("E"));
}

// =============================================================================
// Materialization
// =============================================================================

#[test]
fn test_every_row_materializes() {
    let mut pipeline = Pipeline::default();
    pipeline
        .load_delimited_bytes(
            "Kontrahent;Email;Telefon;Kwota;Data\n\
             Acme;;;10,00;\n\
             ;b@c.pl;;5,00;nie wiem\n\
             Gamma;;501234567;7,5;2024-01-01\n"
                .as_bytes(),
        )
        .unwrap();

    let records = pipeline.preview_all(today());
    assert_eq!(records.len(), pipeline.row_count());
    for record in &records {
        for (field, _) in pipeline.mapping().iter() {
            assert!(record.values.contains_key(field));
        }
        assert!(record.values.contains_key("data_faktury"));
        assert!(record.dni_po_terminie >= 0);
    }

    assert_eq!(records[0].get("email"), "");
    assert!(!records[0].invoice_date_parsed);
    assert!(!records[1].invoice_date_parsed);
    assert_eq!(records[1].dni_po_terminie, 0);
    assert!(records[2].invoice_date_parsed);
    assert_eq!(records[2].get("kwota"), "7,50");

    assert_eq!(pipeline.preview_all(today()), records);
}

#[test]
fn test_days_overdue_with_configured_term() {
    let (days, parsed) = materialize::days_overdue("01.01.2024", today(), DEFAULT_PAYMENT_TERM_DAYS);
    assert_eq!((days, parsed), (7, true));
    assert_eq!(materialize::days_overdue("20.01.2024", today(), 7), (0, true));
    assert_eq!(materialize::days_overdue("2024/01/01", today(), 14), (0, true));
    assert_eq!(materialize::days_overdue("2024-01-01", today(), 0), (14, true));

    let mut pipeline = Pipeline::new(3);
    pipeline
        .load_delimited_bytes("Kontrahent;Kwota;Data\nAcme;10,00;01.01.2024\n".as_bytes())
        .unwrap();
    assert_eq!(pipeline.materialize(0, today()).unwrap().dni_po_terminie, 11);
}

#[test]
fn test_amount_normalization_follows_column_majority() {
    let mapping: ColumnMapping = [("kwota".to_string(), "Kwota".to_string())].into_iter().collect();

    let mut comma = RawTable::from_strings(&["Kwota"], &[&["1 234,56 zł"], &["10,00"], &["abc"]]);
    materialize::normalize(&mut comma, &mapping);
    assert_eq!(comma.cell(0, "Kwota"), Some("1234.56"));
    assert_eq!(comma.cell(1, "Kwota"), Some("10"));
    assert_eq!(comma.cell(2, "Kwota"), None);

    let mut dot = RawTable::from_strings(&["Kwota"], &[&["1,234.56"], &["2.50"], &["3.75"]]);
    materialize::normalize(&mut dot, &mapping);
    assert_eq!(dot.cell(0, "Kwota"), Some("1234.56"));
    assert_eq!(dot.cell(1, "Kwota"), Some("2.5"));

    let normalized_once = dot.clone();
    materialize::normalize(&mut dot, &mapping);
    assert_eq!(dot, normalized_once);
}

#[test]
fn test_settled_items_removed_once() {
    let mut pipeline = Pipeline::default();
    pipeline
        .load_delimited_bytes("Kontrahent;Kwota\nA;-1,00\nB;brak\nC;1 234,56 zł\nD;150,00\n".as_bytes())
        .unwrap();
    assert_eq!(pipeline.row_count(), 4);

    assert_eq!(pipeline.remove_settled_items(), 2);
    assert_eq!(pipeline.row_count(), 2);
    assert_eq!(pipeline.materialize(0, today()).unwrap().get("kontrahent"), "C");
    assert_eq!(pipeline.materialize(1, today()).unwrap().get("kwota"), "150,00");
    assert_eq!(pipeline.remove_settled_items(), 0);
}

#[test]
fn test_pipeline_removes_negative_balances() {
    let mut pipeline = Pipeline::default();
    let summary = pipeline
        .load_delimited_bytes("Kontrahent;Kwota\nA;0,00\nB;-50,00\nC;120,00\n".as_bytes())
        .unwrap();
    assert_eq!(summary.zero_amount_rows, 1);
    assert_eq!(pipeline.row_count(), 2);

    assert_eq!(pipeline.remove_settled_items(), 1);
    assert_eq!(pipeline.search_rows("c", "Kontrahent").unwrap(), vec![0]);
}

// =============================================================================
// Saved settings
// =============================================================================

#[test]
fn test_saved_mapping_reapplied_to_next_file() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path());

    let mut pipeline = Pipeline::default();
    pipeline
        .load_delimited_bytes("Odbiorca;Kol;Uwagi;Kwota\nAcme;a@b.pl;x;10,00\n".as_bytes())
        .unwrap();
    pipeline.force_mapping("email", "Kol").unwrap();
    pipeline.force_mapping("nr_faktury", "Uwagi").unwrap();
    store.save_mapping(pipeline.mapping()).unwrap();

    let saved = store.load_mapping().unwrap().unwrap();
    pipeline
        .load_delimited_bytes("Odbiorca;Kol;Kwota\nBeta;c@d.pl;5,00\n".as_bytes())
        .unwrap();
    let dropped = pipeline.apply_saved_mapping(saved).unwrap();

    assert_eq!(dropped, vec!["nr_faktury".to_string()]);
    assert_eq!(pipeline.mapping().get("email"), Some("Kol"));
    assert_eq!(pipeline.materialize(0, today()).unwrap().get("email"), "c@d.pl");
}

// =============================================================================
// Dispatch
// =============================================================================

struct RejectingMail;

impl EmailSender for RejectingMail {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn send(&self, to: &str, _subject: &str, _html_body: &str) -> (bool, String) {
        if to.ends_with("@blocked.pl") {
            (false, "mailbox unavailable".to_string())
        } else {
            (true, "queued".to_string())
        }
    }
}

#[test]
fn test_dispatch_isolates_failures_per_row() {
    let mut pipeline = Pipeline::default();
    pipeline
        .load_delimited_bytes(
            "Kontrahent;Numer;Email;Telefon;Kwota;Data\n\
             Acme;FV/1/2024;zly@blocked.pl;501234567;100,00;01.01.2024\n\
             Beta;FV/2/2024;ok@firma.pl;;50,00;05.01.2024\n"
                .as_bytes(),
        )
        .unwrap();
    pipeline.require_mapping(&REQUIRED_FIELDS).unwrap();
    let records = pipeline.preview_all(today());

    let mail = RejectingMail;
    let sms = DryRunSender::new();
    let dispatcher = Dispatcher::new(Some(&mail), Some(&sms));
    let templates = MessageTemplates {
        email: Some(TemplateKind::Email.default_text().to_string()),
        sms: Some("{nr_faktury} {kwota} zł, {dni_po_terminie} dni".to_string()),
    };

    let report = dispatcher.run(&records, None, &templates, |_| {});

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.failed(Channel::Email), 1);
    assert_eq!(report.sent(Channel::Email), 1);
    assert_eq!(report.sent(Channel::Sms), 1);
    assert!(report.results[1].sms.is_none());
    assert_eq!(
        report.results[0].email.as_ref().unwrap().message,
        "mailbox unavailable"
    );

    let messages = sms.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body, "FV/1/2024 100,00 zł, 7 dni");
}

#[test]
fn test_missing_required_field_blocks_dispatch() {
    let mut pipeline = Pipeline::default();
    pipeline
        .load_delimited_bytes("Kontrahent;Kwota\nAcme;10,00\n".as_bytes())
        .unwrap();
    match pipeline.require_mapping(&REQUIRED_FIELDS) {
        Err(Error::MissingMapping(fields)) => {
            assert_eq!(fields, vec!["nr_faktury", "email", "telefon"]);
        }
        other => panic!("expected MissingMapping, got {:?}", other),
    }
}
