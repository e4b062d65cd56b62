//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
///
/// `UnreadableFile` and `EmptyData` are the only ingestion failures a caller
/// ever sees; every intermediate parse attempt is swallowed and logged.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unreadable file: {0}")]
    UnreadableFile(String),

    #[error("No usable data: {0}")]
    EmptyData(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing column mapping for: {}", .0.join(", "))]
    MissingMapping(Vec<String>),

    #[error("Template error: {0}")]
    TemplateFormat(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an unreadable file error
    pub fn unreadable(msg: impl Into<String>) -> Self {
        Self::UnreadableFile(msg.into())
    }

    /// Create an empty data error
    pub fn empty(msg: impl Into<String>) -> Self {
        Self::EmptyData(msg.into())
    }

    /// Create a template formatting error
    pub fn template(msg: impl Into<String>) -> Self {
        Self::TemplateFormat(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the error should block the operator (as opposed to a
    /// degraded, silently tolerated condition)
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::UnreadableFile(_) | Self::EmptyData(_) | Self::MissingMapping(_)
        )
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_mapping_message_lists_fields() {
        let err = Error::MissingMapping(vec!["email".to_string(), "kwota".to_string()]);
        assert_eq!(err.to_string(), "Missing column mapping for: email, kwota");
    }

    #[test]
    fn test_blocking_errors() {
        assert!(Error::unreadable("x").is_blocking());
        assert!(Error::empty("x").is_blocking());
        assert!(Error::MissingMapping(vec![]).is_blocking());
        assert!(!Error::template("x").is_blocking());
        assert!(!Error::Delivery("x".into()).is_blocking());
    }
}
