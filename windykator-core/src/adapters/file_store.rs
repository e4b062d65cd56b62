//! File-backed settings store
//!
//! Layout inside the data directory:
//! - `column_mapping.json` - last saved field -> column mapping
//! - `email_template.txt`, `sms_template.txt` - message templates
//! - `placeholders.json` - constant placeholders

use std::path::{Path, PathBuf};

use crate::domain::result::{Error, Result};
use crate::domain::template::default_placeholders;
use crate::domain::{ColumnMapping, Placeholder, TemplateKind};
use crate::ports::SettingsStore;

const MAPPING_FILE: &str = "column_mapping.json";
const PLACEHOLDERS_FILE: &str = "placeholders.json";

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn template_path(&self, kind: TemplateKind) -> PathBuf {
        self.dir.join(format!("{}_template.txt", kind.as_str()))
    }

    fn write(&self, name: &Path, content: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(name, content)?;
        Ok(())
    }

    fn remove(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SettingsStore for FileStore {
    fn load_mapping(&self) -> Result<Option<ColumnMapping>> {
        let path = self.dir.join(MAPPING_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let mapping = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(Some(mapping))
    }

    fn save_mapping(&self, mapping: &ColumnMapping) -> Result<()> {
        let content = serde_json::to_string_pretty(mapping)?;
        self.write(&self.dir.join(MAPPING_FILE), &content)
    }

    fn clear_mapping(&self) -> Result<()> {
        Self::remove(&self.dir.join(MAPPING_FILE))
    }

    fn load_template(&self, kind: TemplateKind) -> Result<String> {
        let path = self.template_path(kind);
        if !path.exists() {
            return Ok(kind.default_text().to_string());
        }
        Ok(std::fs::read_to_string(path)?)
    }

    fn save_template(&self, kind: TemplateKind, text: &str) -> Result<()> {
        self.write(&self.template_path(kind), text)
    }

    fn reset_template(&self, kind: TemplateKind) -> Result<()> {
        Self::remove(&self.template_path(kind))
    }

    fn load_placeholders(&self) -> Result<Vec<Placeholder>> {
        let path = self.dir.join(PLACEHOLDERS_FILE);
        if !path.exists() {
            return Ok(default_placeholders());
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    fn save_placeholders(&self, placeholders: &[Placeholder]) -> Result<()> {
        let content = serde_json::to_string_pretty(placeholders)?;
        self.write(&self.dir.join(PLACEHOLDERS_FILE), &content)
    }
}
