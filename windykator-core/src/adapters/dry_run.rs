//! Sender that delivers nothing
//!
//! Records every message it is handed and reports success. Used for
//! `send --dry-run` and in tests.

use std::sync::Mutex;

use crate::domain::Channel;
use crate::ports::{EmailSender, SendOutcome, SmsSender};

/// A message captured by [`DryRunSender`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedMessage {
    pub channel: Channel,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct DryRunSender {
    messages: Mutex<Vec<CapturedMessage>>,
}

impl DryRunSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything captured so far, in send order
    pub fn messages(&self) -> Vec<CapturedMessage> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn capture(&self, message: CapturedMessage) -> SendOutcome {
        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push(message);
        (true, format!("dry run #{}", messages.len()))
    }
}

impl EmailSender for DryRunSender {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn send(&self, to: &str, subject: &str, html_body: &str) -> SendOutcome {
        self.capture(CapturedMessage {
            channel: Channel::Email,
            recipient: to.to_string(),
            subject: Some(subject.to_string()),
            body: html_body.to_string(),
        })
    }
}

impl SmsSender for DryRunSender {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn send(&self, phone_number: &str, text: &str) -> SendOutcome {
        self.capture(CapturedMessage {
            channel: Channel::Sms,
            recipient: phone_number.to_string(),
            subject: None,
            body: text.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_both_channels() {
        let sender = DryRunSender::new();
        let (ok, message) = EmailSender::send(&sender, "a@b.pl", "Temat", "<p>x</p>");
        assert!(ok);
        assert_eq!(message, "dry run #1");
        SmsSender::send(&sender, "501234567", "tekst");

        let messages = sender.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].channel, Channel::Email);
        assert_eq!(messages[0].subject.as_deref(), Some("Temat"));
        assert_eq!(messages[1].channel, Channel::Sms);
        assert_eq!(messages[1].recipient, "501234567");
    }
}
