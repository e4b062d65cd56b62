//! Windykator Core - payment reminders from invoice spreadsheets
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core data (RawTable, ColumnMapping, SemanticRecord, templates)
//! - **ports**: Trait definitions for external collaborators (senders, settings store)
//! - **services**: Ingestion pipeline, dispatch and event logging
//! - **adapters**: Concrete implementations (SMSAPI, Microsoft Graph, files)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use adapters::{FileStore, GraphMailSender, SmsApiSender};
use config::Config;
use ports::{EmailSender, SettingsStore, SmsSender};
use services::{Dispatcher, MessageTemplates, Pipeline};

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{
    Channel, ColumnMapping, DeliveryStatus, DispatchReport, Placeholder, RawTable, RowOutcome,
    SemanticField, SemanticRecord, TemplateKind, REQUIRED_FIELDS,
};

/// Main context for Windykator operations
///
/// Wires the configuration, the settings store and the messaging
/// collaborators together for a front end.
pub struct WindykatorContext {
    pub data_dir: PathBuf,
    pub config: Config,
    pub store: FileStore,
}

impl WindykatorContext {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let config = Config::load(data_dir)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            config,
            store: FileStore::new(data_dir),
        })
    }

    /// A fresh pipeline using the configured payment term
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.config.dispatch.payment_term_days)
    }

    /// Graph mail sender, or `None` when no credentials are configured
    pub fn email_sender(&self) -> Result<Option<GraphMailSender>> {
        let email = &self.config.email;
        match (email.access_token.as_deref(), email.mailbox.as_deref()) {
            (Some(token), Some(mailbox)) if !token.trim().is_empty() && !mailbox.trim().is_empty() => {
                Ok(Some(GraphMailSender::new(&email.graph_url, token, mailbox)?))
            }
            _ => Ok(None),
        }
    }

    /// SMSAPI sender, or `None` when no token is configured
    pub fn sms_sender(&self) -> Result<Option<SmsApiSender>> {
        let sms = &self.config.sms;
        match sms.token.as_deref() {
            Some(token) if !token.trim().is_empty() => {
                Ok(Some(SmsApiSender::new(&sms.url, token, Some(&sms.sender))?))
            }
            _ => Ok(None),
        }
    }

    /// Saved templates for the requested channels
    pub fn templates(&self, email: bool, sms: bool) -> Result<MessageTemplates> {
        Ok(MessageTemplates {
            email: if email { Some(self.store.load_template(TemplateKind::Email)?) } else { None },
            sms: if sms { Some(self.store.load_template(TemplateKind::Sms)?) } else { None },
        })
    }

    /// A dispatcher configured from settings and saved placeholders
    ///
    /// `test_mode` forces test sends on top of the configured flag.
    pub fn dispatcher<'a>(
        &self,
        email_sender: Option<&'a dyn EmailSender>,
        sms_sender: Option<&'a dyn SmsSender>,
        test_mode: bool,
    ) -> Result<Dispatcher<'a>> {
        let placeholders = self.store.load_placeholders()?;
        Ok(Dispatcher::new(email_sender, sms_sender)
            .with_subject(self.config.email.subject.clone())
            .with_delay(Duration::from_secs(self.config.dispatch.delay_seconds))
            .with_placeholders(placeholders)
            .with_test_mode(test_mode || self.config.test_mode(), self.config.sms.test_number.clone()))
    }
}
