//! Settings store port - persisted mapping, templates and placeholders

use crate::domain::result::Result;
use crate::domain::{ColumnMapping, Placeholder, TemplateKind};

/// Persistence for the operator's reusable settings
///
/// Loading something that was never saved is not an error: mappings come
/// back `None`, templates and placeholders fall back to built-in defaults.
pub trait SettingsStore: Send + Sync {
    fn load_mapping(&self) -> Result<Option<ColumnMapping>>;

    fn save_mapping(&self, mapping: &ColumnMapping) -> Result<()>;

    /// Forget the saved mapping
    fn clear_mapping(&self) -> Result<()>;

    fn load_template(&self, kind: TemplateKind) -> Result<String>;

    fn save_template(&self, kind: TemplateKind, text: &str) -> Result<()>;

    /// Drop a saved template so the built-in default applies again
    fn reset_template(&self, kind: TemplateKind) -> Result<()>;

    fn load_placeholders(&self) -> Result<Vec<Placeholder>>;

    fn save_placeholders(&self, placeholders: &[Placeholder]) -> Result<()>;
}
