//! Document files on disk.
//!
//! Documents are stored as JSON, or as YAML when the file extension is
//! `.yaml` or `.yml`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::document::{load_document, save_document};
use crate::engine::Document;
use crate::error::AutomacroError;
use crate::macros::{Registry, SegmentData};

/// On-disk format of a document file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Pretty-printed JSON.
    Json,
    /// YAML.
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        if path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml")
        {
            Self::Yaml
        } else {
            Self::Json
        }
    }
}

/// Storage for the macro document.
pub struct DocumentStorage {
    path: PathBuf,
}

impl DocumentStorage {
    /// Create storage for a custom file.
    #[must_use]
    pub const fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the document file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the document file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// File format of the document.
    #[must_use]
    pub fn format(&self) -> DocumentFormat {
        DocumentFormat::from_path(&self.path)
    }

    /// Read the raw object tree without migrating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read_raw(&self) -> Result<Option<SegmentData>, AutomacroError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&self.path).map_err(|e| {
            AutomacroError::Document(format!(
                "Failed to read document {}: {e}",
                self.path.display()
            ))
        })?;

        let data: SegmentData = match self.format() {
            DocumentFormat::Json => serde_json::from_str(&text)
                .map_err(|e| AutomacroError::Document(format!("Failed to parse document: {e}")))?,
            DocumentFormat::Yaml => serde_yaml::from_str(&text)
                .map_err(|e| AutomacroError::Document(format!("Failed to parse document: {e}")))?,
        };
        Ok(Some(data))
    }

    /// Load and migrate the document.
    ///
    /// Returns `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or restored.
    pub fn load(&self, registry: &Registry) -> Result<Option<Document>, AutomacroError> {
        let Some(data) = self.read_raw()? else {
            debug!(path = %self.path.display(), "no document file");
            return Ok(None);
        };
        let document = load_document(data, registry)?;
        info!(
            path = %self.path.display(),
            macros = document.macros().len(),
            variables = document.variables().len(),
            "document loaded"
        );
        Ok(Some(document))
    }

    /// Load the document, or an empty one if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read, parsed or restored.
    pub fn load_or_default(&self, registry: &Registry) -> Result<Document, AutomacroError> {
        Ok(self.load(registry)?.unwrap_or_default())
    }

    /// Save the document at the current version.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or written.
    pub fn save(&self, document: &Document) -> Result<(), AutomacroError> {
        let data = save_document(document)?;
        let text = match self.format() {
            DocumentFormat::Json => serde_json::to_string_pretty(&data).map_err(|e| {
                AutomacroError::Document(format!("Failed to serialize document: {e}"))
            })?,
            DocumentFormat::Yaml => serde_yaml::to_string(&data).map_err(|e| {
                AutomacroError::Document(format!("Failed to serialize document: {e}"))
            })?,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AutomacroError::Document(format!("Failed to create document directory: {e}"))
            })?;
        }
        fs::write(&self.path, text)
            .map_err(|e| AutomacroError::Document(format!("Failed to write document: {e}")))?;

        debug!(path = %self.path.display(), "document saved");
        Ok(())
    }
}
