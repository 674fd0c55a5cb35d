//! User settings, read from `~/.automacro/config.yaml`.
//!
//! Every key is optional. A missing file means all defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Paths;
use crate::error::AutomacroError;

/// Settings shared by every command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineSettings,
    pub log: LogSettings,
    /// Macro document to use instead of `~/.automacro/macros.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<PathBuf>,
}

/// Scheduler timing and startup behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Time between the starts of two evaluation passes.
    pub interval_ms: u64,
    /// Sleep used when a pass overruns the interval.
    pub min_sleep_ms: u64,
    /// Condition checks slower than this are logged.
    pub slow_check_warn_ms: u64,
    /// `run` pauses every macro before the first pass.
    pub start_paused: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            interval_ms: 300,
            min_sleep_ms: 10,
            slow_check_warn_ms: 300,
            start_paused: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter directive for the `automacro` target when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

impl Config {
    /// Read settings from `path`. An absent file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `AutomacroError::Config` if the file is unreadable or not
    /// valid YAML for these settings.
    pub fn read(path: &Path) -> Result<Self, AutomacroError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(AutomacroError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        serde_yaml::from_str(&text)
            .map_err(|e| AutomacroError::Config(format!("bad settings in {}: {e}", path.display())))
    }

    /// The configured document, falling back to the one under `paths`.
    #[must_use]
    pub fn document_path(&self, paths: &Paths) -> PathBuf {
        match &self.document {
            Some(path) => path.clone(),
            None => paths.document.clone(),
        }
    }
}
