//! Command implementations for automacro.
//!
//! Every command resolves a [`Workspace`] from the global arguments, does
//! its work on the loaded document and returns the text to print.

mod document;
mod engine;

pub use document::{migrate, set_paused, validate};
pub use engine::{run, run_macro, tick};

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::Shell;
use tracing::{debug, info};

use crate::builtins;
use crate::cli::args::{Cli, OutputFormat};
use crate::config::{Config, Paths};
use crate::engine::Document;
use crate::error::AutomacroError;
use crate::macros::Registry;
use crate::output::{
    format_macro, format_macros, format_variables, macro_views, variable_views, MacroView,
};
use crate::storage::DocumentStorage;

/// Resolved configuration, document location and segment types.
pub struct Workspace {
    /// Loaded configuration.
    pub config: Config,
    /// Where the document is read from and saved to.
    pub storage: DocumentStorage,
    /// Known condition and action types.
    pub registry: Registry,
}

impl Workspace {
    /// Resolve the workspace from the global arguments.
    ///
    /// `--document` wins over the config's `document`, which wins over the
    /// default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn open(config: Option<&Path>, document: Option<PathBuf>) -> Result<Self, AutomacroError> {
        let paths = Paths::default();
        let config = match config {
            Some(path) => Config::read(path)?,
            None => Config::read(&paths.config_file)?,
        };
        let path = document.unwrap_or_else(|| config.document_path(&paths));
        debug!(document = %path.display(), "resolved document path");

        Ok(Self {
            config,
            storage: DocumentStorage::with_path(path),
            registry: builtins::default_registry(),
        })
    }

    /// Load the document, or an empty one if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn load(&self) -> Result<Document, AutomacroError> {
        self.storage.load_or_default(&self.registry)
    }

    /// Load the document, failing if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AutomacroError::NotFound` if there is no document file.
    pub fn load_existing(&self) -> Result<Document, AutomacroError> {
        self.storage.load(&self.registry)?.ok_or_else(|| {
            AutomacroError::NotFound(format!("Document {}", self.storage.path().display()))
        })
    }

    /// Load the document for evaluation, applying `engine.start_paused`.
    /// The first pass skips the actions of `skip_exec_on_start` macros.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn load_for_run(&self) -> Result<Document, AutomacroError> {
        let mut document = self.load()?;
        document.mark_startup();
        if self.config.engine.start_paused {
            info!("starting with every macro paused");
            for key in document.macros().keys() {
                if let Some(item) = document.macros_mut().get_mut(key) {
                    item.set_paused(true);
                }
            }
        }
        Ok(document)
    }

    /// Save the document to its file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, document: &Document) -> Result<(), AutomacroError> {
        self.storage.save(document)
    }
}

fn find_macro(document: &Document, name: &str) -> Result<MacroView, AutomacroError> {
    document
        .macros()
        .by_name(name)
        .map(MacroView::from)
        .ok_or_else(|| AutomacroError::NotFound(format!("Macro '{name}'")))
}

/// Execute list command
///
/// # Errors
///
/// Returns an error if the document cannot be loaded or output formatting fails.
pub fn list(workspace: &Workspace, format: OutputFormat) -> Result<String, AutomacroError> {
    let document = workspace.load()?;
    format_macros(&macro_views(&document), format)
}

/// Execute show command
///
/// # Errors
///
/// Returns `AutomacroError::NotFound` if no macro has this name.
pub fn show(workspace: &Workspace, name: &str, format: OutputFormat) -> Result<String, AutomacroError> {
    let document = workspace.load()?;
    format_macro(&find_macro(&document, name)?, format)
}

/// Execute variables command
///
/// # Errors
///
/// Returns an error if the document cannot be loaded or output formatting fails.
pub fn variables(workspace: &Workspace, format: OutputFormat) -> Result<String, AutomacroError> {
    let document = workspace.load()?;
    format_variables(&variable_views(&document), format)
}

/// Write shell completions to `out`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn completions(shell: Shell, out: &mut impl Write) -> Result<(), AutomacroError> {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "automacro", out);
    out.flush()?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use serde_json::json;

    /// A small document: a counter macro, a paused macro and two variables.
    pub fn write_document(path: &Path) {
        let document = json!({
            "version": 1,
            "variables": [
                {"name": "counter", "value": "0", "save_action": "save"},
                {"name": "greeting", "default_value": "hello", "save_action": "set_default"}
            ],
            "macros": [{
                "version": 1,
                "name": "count",
                "pause": false,
                "conditions": [{
                    "id": "variable",
                    "version": 1,
                    "logic": "and",
                    "variable": "greeting",
                    "condition": "equals",
                    "value": "hello"
                }],
                "actions": [{
                    "id": "variable",
                    "version": 1,
                    "variable": "counter",
                    "action": "increment",
                    "value": "1"
                }]
            }, {
                "version": 1,
                "name": "sleeping",
                "pause": true,
                "conditions": [],
                "actions": [{"id": "log", "message": "never"}]
            }]
        });
        std::fs::write(path, serde_json::to_string_pretty(&document).unwrap()).unwrap();
    }
}
