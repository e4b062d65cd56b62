//! Configuration management
//!
//! `settings.json` in the data directory:
//! ```json
//! {
//!   "sms": { "token": "...", "sender": "Windykacja", "url": "...", "testNumber": "..." },
//!   "email": { "accessToken": "...", "mailbox": "...", "subject": "...", "graphUrl": "..." },
//!   "dispatch": { "paymentTermDays": 7, "delaySeconds": 2, "testMode": false }
//! }
//! ```
//! Keys this crate does not manage are kept as-is on save.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::adapters::graph_mail::DEFAULT_GRAPH_URL;
use crate::adapters::smsapi::DEFAULT_SMSAPI_URL;
use crate::services::dispatch::DEFAULT_SUBJECT;
use crate::services::materialize::DEFAULT_PAYMENT_TERM_DAYS;

pub const SETTINGS_FILE: &str = "settings.json";

type Extra = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsSettings {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_sms_sender")]
    pub sender: String,
    #[serde(default = "default_sms_url")]
    pub url: String,
    #[serde(default)]
    pub test_number: Option<String>,
    #[serde(flatten)]
    other: Extra,
}

fn default_sms_sender() -> String {
    "Windykacja".to_string()
}

fn default_sms_url() -> String {
    DEFAULT_SMSAPI_URL.to_string()
}

impl Default for SmsSettings {
    fn default() -> Self {
        Self {
            token: None,
            sender: default_sms_sender(),
            url: default_sms_url(),
            test_number: None,
            other: Extra::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSettings {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub mailbox: Option<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
    #[serde(flatten)]
    other: Extra,
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_string()
}

fn default_graph_url() -> String {
    DEFAULT_GRAPH_URL.to_string()
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            access_token: None,
            mailbox: None,
            subject: default_subject(),
            graph_url: default_graph_url(),
            other: Extra::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSettings {
    #[serde(default = "default_payment_term")]
    pub payment_term_days: i64,
    #[serde(default = "default_delay")]
    pub delay_seconds: u64,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(flatten)]
    other: Extra,
}

/// Longest payment term accepted, ten years
pub const MAX_PAYMENT_TERM_DAYS: i64 = 3650;

fn default_payment_term() -> i64 {
    DEFAULT_PAYMENT_TERM_DAYS
}

fn default_delay() -> u64 {
    2
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            payment_term_days: default_payment_term(),
            delay_seconds: default_delay(),
            test_mode: false,
            other: Extra::new(),
        }
    }
}

/// Windykator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub sms: SmsSettings,
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(flatten)]
    other: Extra,
    /// `WINDYKATOR_TEST_MODE`, when set; never written back
    #[serde(skip)]
    test_mode_override: Option<bool>,
}

/// Keys accepted by [`Config::set`]
pub const SETTABLE_KEYS: [&str; 11] = [
    "sms.token",
    "sms.sender",
    "sms.url",
    "sms.testNumber",
    "email.accessToken",
    "email.mailbox",
    "email.subject",
    "email.graphUrl",
    "dispatch.paymentTermDays",
    "dispatch.delaySeconds",
    "dispatch.testMode",
];

impl Config {
    /// Load config from the data directory
    ///
    /// A missing or malformed file yields defaults. Test mode can also be
    /// forced through the `WINDYKATOR_TEST_MODE` environment variable.
    pub fn load(dir: &Path) -> Result<Self> {
        let settings_path = dir.join(SETTINGS_FILE);

        let mut config: Config = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %settings_path.display(), error = %e, "ignoring malformed settings file");
                Config::default()
            })
        } else {
            Config::default()
        };

        if !(0..=MAX_PAYMENT_TERM_DAYS).contains(&config.dispatch.payment_term_days) {
            tracing::warn!(
                payment_term_days = config.dispatch.payment_term_days,
                "payment term out of range, using the default"
            );
            config.dispatch.payment_term_days = default_payment_term();
        }

        config.test_mode_override = match std::env::var("WINDYKATOR_TEST_MODE").ok().as_deref() {
            Some("true" | "1" | "yes" | "TRUE" | "YES") => Some(true),
            Some("false" | "0" | "no" | "FALSE" | "NO") => Some(false),
            _ => None,
        };

        Ok(config)
    }

    /// Save config to the data directory
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }

    /// Effective test mode (environment wins over the file)
    pub fn test_mode(&self) -> bool {
        self.test_mode_override.unwrap_or(self.dispatch.test_mode)
    }

    /// Set a value by dotted key (e.g. `sms.token`)
    ///
    /// An empty value clears optional keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let optional = || (!value.is_empty()).then(|| value.to_string());

        match key {
            "sms.token" => self.sms.token = optional(),
            "sms.sender" => self.sms.sender = value.to_string(),
            "sms.url" => self.sms.url = value.to_string(),
            "sms.testNumber" => self.sms.test_number = optional(),
            "email.accessToken" => self.email.access_token = optional(),
            "email.mailbox" => self.email.mailbox = optional(),
            "email.subject" => self.email.subject = value.to_string(),
            "email.graphUrl" => self.email.graph_url = value.to_string(),
            "dispatch.paymentTermDays" => {
                let days: i64 = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("paymentTermDays must be a whole number"))?;
                if !(0..=MAX_PAYMENT_TERM_DAYS).contains(&days) {
                    anyhow::bail!("paymentTermDays must be between 0 and {}", MAX_PAYMENT_TERM_DAYS);
                }
                self.dispatch.payment_term_days = days;
            }
            "dispatch.delaySeconds" => {
                self.dispatch.delay_seconds = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("delaySeconds must be a whole number"))?;
            }
            "dispatch.testMode" => {
                self.dispatch.test_mode = match value {
                    "true" | "1" | "yes" | "on" => true,
                    "false" | "0" | "no" | "off" => false,
                    _ => anyhow::bail!("testMode must be true or false"),
                };
            }
            _ => anyhow::bail!("Unknown config key: {} (expected one of: {})", key, SETTABLE_KEYS.join(", ")),
        }
        Ok(())
    }

    /// Settings as JSON with credentials masked
    pub fn redacted(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        for (section, key) in [("sms", "token"), ("email", "accessToken")] {
            if let Some(secret) = value.get_mut(section).and_then(|s| s.get_mut(key)) {
                if secret.is_string() {
                    *secret = serde_json::Value::String("********".to_string());
                }
            }
        }
        value
    }
}
