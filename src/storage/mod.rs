//! Persistence for automacro.
//!
//! This module provides:
//! - a small versioned-migration helper for persisted objects
//! - conversion between documents and their persisted object tree
//! - JSON and YAML document files

mod document;
pub mod migrate;
mod file;

pub use document::{
    load_document, load_macro, save_document, save_macro, DOCUMENT_VERSION, MACRO_VERSION,
};
pub use file::{DocumentFormat, DocumentStorage};
pub use migrate::{get_version, set_version, MigrationStep, Migrations, VERSION_KEY};
