//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external collaborators. The pipeline and
//! dispatcher depend only on these traits, never on concrete senders or
//! storage.

mod sender;
mod store;

pub use sender::{EmailSender, SendOutcome, SmsSender};
pub use store::SettingsStore;
