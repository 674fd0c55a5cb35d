//! Settings and file locations.
//!
//! Settings are only read; automacro never writes `config.yaml`.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::{Config, EngineSettings, LogSettings};
