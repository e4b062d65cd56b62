//! Adapters for messaging providers and local persistence

pub mod dry_run;
pub mod file_store;
pub mod graph_mail;
pub mod smsapi;

pub use dry_run::{CapturedMessage, DryRunSender};
pub use file_store::FileStore;
pub use graph_mail::GraphMailSender;
pub use smsapi::SmsApiSender;
