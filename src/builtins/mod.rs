//! Built-in condition and action types.
//!
//! Each type stores its settings in a serde struct next to the shared entry
//! fields of its segment object. Types whose layout changed over time carry
//! a `version` field and a migration chain that upgrades older layouts on
//! load.

pub mod actions;
pub mod conditions;

use crate::macros::Registry;

/// Register every built-in condition and action type.
pub fn register_all(registry: &mut Registry) {
    conditions::register(registry);
    actions::register(registry);
}

/// A registry holding the built-in types.
#[must_use]
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    register_all(&mut registry);
    registry
}
