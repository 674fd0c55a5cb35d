//! Command-line interface: argument types and command implementations.

pub mod args;
pub mod commands;
