//! Service layer
//!
//! The ingestion stages (`ingest`, `cleaning`, `column_mapping`,
//! `materialize`) are plain functions over a `RawTable`; `Pipeline` owns the
//! loaded state and chains them. `Dispatcher` and `LoggingService` sit on top.

pub mod cleaning;
pub mod column_mapping;
pub mod dispatch;
pub mod ingest;
pub mod logging;
pub mod materialize;
mod pipeline;

pub use column_mapping::FieldSummary;
pub use dispatch::{Dispatcher, MessageTemplates};
pub use ingest::{LoadedTable, ParseStrategy, SourceFormat, TextEncoding};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use pipeline::{LoadSummary, Pipeline};
