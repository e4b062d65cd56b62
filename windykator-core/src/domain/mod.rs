//! Core domain types
//!
//! Pure data structures for the ingested table, the column mapping, the
//! materialized records, templates and dispatch results. No I/O here.

mod dispatch;
mod mapping;
mod record;
pub mod result;
mod table;
pub mod template;

pub use dispatch::{Channel, DeliveryStatus, DispatchReport, RowOutcome};
pub use mapping::{ColumnMapping, SemanticField, REQUIRED_FIELDS};
pub use record::{SemanticRecord, DAYS_OVERDUE_KEY};
pub use table::{is_blank, Cell, RawTable};
pub use template::{Placeholder, TemplateKind};
