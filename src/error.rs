//! Error types for automacro.

use thiserror::Error;

/// Errors produced by the engine, its storage and the command-line front end.
///
/// Runtime failures inside individual conditions and actions are not
/// represented here: those degrade to `false` or a no-op and are logged.
#[derive(Debug, Error)]
pub enum AutomacroError {
    /// Configuration could not be read or resolved.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A macro document is malformed or could not be persisted.
    #[error("Document error: {0}")]
    Document(String),

    /// A named macro, variable or segment does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A value could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A segment edit was rejected.
    #[error("Segment error: {0}")]
    Segment(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AutomacroError {
    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound(_) => 2,
            Self::Config(_) => 3,
            Self::Document(_) | Self::Parse(_) | Self::Json(_) | Self::Yaml(_) => 4,
            Self::Segment(_) | Self::Io(_) => 1,
        }
    }
}
