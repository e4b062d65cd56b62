//! Message sender ports

/// `(success, message)` as reported by a messaging collaborator
///
/// The message is opaque: a provider id on success, the provider's error
/// text on failure.
pub type SendOutcome = (bool, String);

/// Email delivery collaborator
///
/// Implementations own their credentials. Failures are reported through the
/// outcome rather than as errors so a dispatch loop can record them per row.
pub trait EmailSender: Send + Sync {
    /// Short provider name (e.g., "graph", "dry-run")
    fn name(&self) -> &str;

    /// Send one message with an HTML body
    fn send(&self, to: &str, subject: &str, html_body: &str) -> SendOutcome;
}

/// SMS delivery collaborator
pub trait SmsSender: Send + Sync {
    /// Short provider name (e.g., "smsapi", "dry-run")
    fn name(&self) -> &str;

    /// Send one text message
    fn send(&self, phone_number: &str, text: &str) -> SendOutcome;
}
