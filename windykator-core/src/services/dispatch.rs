//! Dispatcher - render templates per record and hand them to the senders
//!
//! Senders are borrowed for the duration of a run; nothing here is global.
//! A failure on one record or channel is recorded in that record's outcome
//! and the run moves on.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::template::{build_context, render_template};
use crate::domain::{
    Channel, DeliveryStatus, DispatchReport, Placeholder, RowOutcome, SemanticField, SemanticRecord,
};
use crate::ports::{EmailSender, SmsSender};

pub const DEFAULT_SUBJECT: &str = "Przypomnienie o płatności";

const TEST_SUBJECT_PREFIX: &str = "TEST - ";
const TEST_SMS_PREFIX: &str = "TEST: ";

/// Templates for the channels to use; a `None` channel is not sent
#[derive(Debug, Clone, Default)]
pub struct MessageTemplates {
    pub email: Option<String>,
    pub sms: Option<String>,
}

pub struct Dispatcher<'a> {
    email_sender: Option<&'a dyn EmailSender>,
    sms_sender: Option<&'a dyn SmsSender>,
    subject: String,
    delay: Duration,
    placeholders: Vec<Placeholder>,
    test_mode: bool,
    test_phone: Option<String>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(email_sender: Option<&'a dyn EmailSender>, sms_sender: Option<&'a dyn SmsSender>) -> Self {
        Self {
            email_sender,
            sms_sender,
            subject: DEFAULT_SUBJECT.to_string(),
            delay: Duration::ZERO,
            placeholders: Vec::new(),
            test_mode: false,
            test_phone: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Pause between consecutive recipients
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_placeholders(mut self, placeholders: Vec<Placeholder>) -> Self {
        self.placeholders = placeholders;
        self
    }

    /// Mark messages as tests; SMS go to `test_phone` instead of the
    /// recipient when one is given
    pub fn with_test_mode(mut self, test_mode: bool, test_phone: Option<String>) -> Self {
        self.test_mode = test_mode;
        self.test_phone = test_phone.filter(|p| !p.trim().is_empty());
        self
    }

    /// Send to the selected records (all when `selection` is `None`)
    ///
    /// `observer` sees each outcome as soon as its record is done.
    pub fn run<F>(
        &self,
        records: &[SemanticRecord],
        selection: Option<&[usize]>,
        templates: &MessageTemplates,
        mut observer: F,
    ) -> DispatchReport
    where
        F: FnMut(&RowOutcome),
    {
        let mut report = DispatchReport::new(self.test_mode);
        let indices: Vec<usize> = match selection {
            Some(selected) => selected.to_vec(),
            None => (0..records.len()).collect(),
        };

        info!(
            run_id = %report.run_id,
            recipients = indices.len(),
            test_mode = self.test_mode,
            "dispatch started"
        );

        let mut first = true;
        for index in indices {
            let Some(record) = records.get(index) else {
                warn!(index, "selected record does not exist, skipped");
                continue;
            };
            if !first && !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            first = false;

            let outcome = self.process(record, templates);
            debug!(row = outcome.row_index, failed = outcome.has_failure(), "record processed");
            observer(&outcome);
            report.results.push(outcome);
        }

        info!(
            run_id = %report.run_id,
            email_sent = report.sent(Channel::Email),
            email_failed = report.failed(Channel::Email),
            sms_sent = report.sent(Channel::Sms),
            sms_failed = report.failed(Channel::Sms),
            "dispatch finished"
        );
        report
    }

    fn process(&self, record: &SemanticRecord, templates: &MessageTemplates) -> RowOutcome {
        let context = build_context(record.template_context(), &self.placeholders);

        let email = templates.email.as_deref().and_then(|template| {
            let address = record.field(SemanticField::Email).trim();
            (!address.is_empty()).then(|| self.send_email(address, template, &context))
        });

        let sms = templates.sms.as_deref().and_then(|template| {
            let phone = record.field(SemanticField::Telefon).trim();
            (!phone.is_empty()).then(|| self.send_sms(phone, template, &context))
        });

        RowOutcome {
            row_index: record.row_index,
            kontrahent: record.field(SemanticField::Kontrahent).to_string(),
            nr_faktury: record.field(SemanticField::NrFaktury).to_string(),
            email,
            sms,
        }
    }

    fn send_email(&self, address: &str, template: &str, context: &BTreeMap<String, String>) -> DeliveryStatus {
        let Some(sender) = self.email_sender else {
            return DeliveryStatus::failed("sender not configured");
        };
        let body = match render_template(template, context) {
            Ok(body) => body,
            Err(e) => return DeliveryStatus::failed(e.to_string()),
        };
        let subject = if self.test_mode {
            format!("{}{}", TEST_SUBJECT_PREFIX, self.subject)
        } else {
            self.subject.clone()
        };
        let (success, message) = sender.send(address, &subject, &text_to_html(&body));
        DeliveryStatus { success, message }
    }

    fn send_sms(&self, phone: &str, template: &str, context: &BTreeMap<String, String>) -> DeliveryStatus {
        let Some(sender) = self.sms_sender else {
            return DeliveryStatus::failed("sender not configured");
        };
        let text = match render_template(template, context) {
            Ok(text) => text,
            Err(e) => return DeliveryStatus::failed(e.to_string()),
        };
        let (recipient, text) = if self.test_mode {
            (
                self.test_phone.as_deref().unwrap_or(phone),
                format!("{}{}", TEST_SMS_PREFIX, text),
            )
        } else {
            (phone, text)
        };
        let (success, message) = sender.send(recipient, &text);
        DeliveryStatus { success, message }
    }
}

/// Plain template text as a minimal HTML body
pub fn text_to_html(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<html><body>{}</body></html>", escaped.replace('\n', "<br>\n"))
}
