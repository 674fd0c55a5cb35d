//! automacro - a macro scheduling and evaluation engine
//!
//! A [`Document`] holds named macros and shared variables. Each evaluation
//! pass checks every unpaused macro's conditions, folds the results with
//! their logic operators and runs the macro's actions when the result is
//! true. Conditions and actions are plugins registered in a [`Registry`].

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod builtins;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod macros;
pub mod output;
pub mod storage;
pub mod variables;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use engine::{CancellationController, Document, Engine, EngineConfig};
pub use error::AutomacroError;
pub use macros::{Action, Condition, Macro, Registry};
