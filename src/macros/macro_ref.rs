//! By-name references between macros.
//!
//! A reference stores the target's name and a cached generational handle.
//! The handle is refreshed by [`MacroRef::post_load`] once the full document
//! exists, and lazily on any use where it has gone stale. A name that does
//! not resolve is a normal state: callers treat the target as absent.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::definition::Macro;
use super::list::{MacroKey, MacroList};

/// Reference to another macro by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MacroRef {
    name: String,
    #[serde(skip)]
    cached: Option<MacroKey>,
}

impl MacroRef {
    /// Reference a macro by name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cached: None,
        }
    }

    /// Referenced name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether no name is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Resolve against a fully loaded document.
    pub fn post_load(&mut self, macros: &MacroList) {
        self.cached = macros.find(&self.name);
    }

    /// Live handle of the target, or `None` if it does not exist.
    pub fn resolve(&mut self, macros: &MacroList) -> Option<MacroKey> {
        if let Some(key) = self.cached {
            if macros.get(key).is_some_and(|m| m.name() == self.name) {
                return Some(key);
            }
        }
        self.cached = macros.find(&self.name);
        self.cached
    }

    /// The target macro, if present.
    pub fn get<'m>(&mut self, macros: &'m MacroList) -> Option<&'m Macro> {
        let key = self.resolve(macros)?;
        macros.get(key)
    }

    /// The target macro for mutation, if present.
    pub fn get_mut<'m>(&mut self, macros: &'m mut MacroList) -> Option<&'m mut Macro> {
        let key = self.resolve(macros)?;
        macros.get_mut(key)
    }
}

impl From<String> for MacroRef {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&str> for MacroRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<MacroRef> for String {
    fn from(reference: MacroRef) -> Self {
        reference.name
    }
}

impl fmt::Display for MacroRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "<none>")
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// An ordered list of macro references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiMacroRef(pub Vec<MacroRef>);

impl MultiMacroRef {
    /// Resolve every entry against a fully loaded document.
    pub fn post_load(&mut self, macros: &MacroList) {
        for reference in &mut self.0 {
            reference.post_load(macros);
        }
    }

    /// Handles of the entries that currently resolve, in order.
    pub fn resolve_all(&mut self, macros: &MacroList) -> Vec<MacroKey> {
        self.0
            .iter_mut()
            .filter_map(|reference| reference.resolve(macros))
            .collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MultiMacroRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(MacroRef::name).collect();
        write!(f, "{}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_reference_resolves_after_post_load() {
        let mut list = MacroList::new();
        let mut reference = MacroRef::new("later");

        reference.post_load(&list);
        assert!(reference.get(&list).is_none());

        list.insert(Macro::new("later")).unwrap();
        reference.post_load(&list);
        assert_eq!(reference.get(&list).map(Macro::name), Some("later"));
    }

    #[test]
    fn test_stale_handle_is_refreshed() {
        let mut list = MacroList::new();
        list.insert(Macro::new("target")).unwrap();
        let mut reference = MacroRef::new("target");
        reference.post_load(&list);

        list.remove("target");
        assert!(reference.resolve(&list).is_none());

        let new_key = list.insert(Macro::new("target")).unwrap();
        assert_eq!(reference.resolve(&list), Some(new_key));
    }

    #[test]
    fn test_missing_target_is_absent() {
        let list = MacroList::new();
        let mut reference = MacroRef::new("ghost");
        assert!(reference.resolve(&list).is_none());
    }

    #[test]
    fn test_multi_resolves_existing_only() {
        let mut list = MacroList::new();
        list.insert(Macro::new("a")).unwrap();
        let mut multi = MultiMacroRef(vec![MacroRef::new("a"), MacroRef::new("b")]);
        multi.post_load(&list);
        assert_eq!(multi.resolve_all(&list).len(), 1);
        assert_eq!(multi.to_string(), "a, b");
    }

    #[test]
    fn test_serializes_as_name() {
        let json = serde_json::to_string(&MacroRef::new("m")).unwrap();
        assert_eq!(json, "\"m\"");
        let multi: MultiMacroRef = serde_json::from_str(r#"["x", "y"]"#).unwrap();
        assert_eq!(multi.len(), 2);
    }
}
