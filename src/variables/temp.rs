//! Per-pass temp variables published by conditions.
//!
//! Each condition instance declares the temp variables it can publish. Values
//! are written during `check` and are cleared at the start of every pass, so
//! they are only visible to the rest of the pass that produced them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::macros::SegmentId;

/// A temp variable a condition may publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempVarDecl {
    /// Identifier used by `publish` and by readers.
    pub id: String,
    /// Label shown to users.
    pub name: String,
    /// Optional longer explanation.
    pub description: String,
}

impl TempVarDecl {
    /// Create a declaration.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
        }
    }

    /// Add a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Reference from an action to a temp variable of one of its macro's
/// conditions, by condition index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempVarRef {
    /// Index of the condition in the owning macro.
    pub index: usize,
    /// Temp variable id.
    pub id: String,
}

impl TempVarRef {
    /// Create a reference.
    #[must_use]
    pub fn new(index: usize, id: impl Into<String>) -> Self {
        Self {
            index,
            id: id.into(),
        }
    }
}

/// Declared temp variables and their values for the current pass.
#[derive(Debug, Default)]
pub struct TempVarBlackboard {
    declared: HashMap<SegmentId, Vec<TempVarDecl>>,
    values: HashMap<SegmentId, HashMap<String, String>>,
}

impl TempVarBlackboard {
    /// Create an empty blackboard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a segment's declarations. Values of dropped ids are removed.
    pub fn declare(&mut self, segment: SegmentId, decls: Vec<TempVarDecl>) {
        if let Some(values) = self.values.get_mut(&segment) {
            values.retain(|id, _| decls.iter().any(|d| &d.id == id));
        }
        if decls.is_empty() {
            self.declared.remove(&segment);
        } else {
            self.declared.insert(segment, decls);
        }
    }

    /// Drop everything known about a segment.
    pub fn forget(&mut self, segment: SegmentId) {
        self.declared.remove(&segment);
        self.values.remove(&segment);
    }

    /// Declarations of a segment.
    #[must_use]
    pub fn declarations(&self, segment: SegmentId) -> &[TempVarDecl] {
        self.declared.get(&segment).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether a segment declares an id.
    #[must_use]
    pub fn is_declared(&self, segment: SegmentId, id: &str) -> bool {
        self.declarations(segment).iter().any(|d| d.id == id)
    }

    /// Publish a value. Undeclared ids are rejected.
    pub fn publish(&mut self, segment: SegmentId, id: &str, value: String) -> bool {
        if !self.is_declared(segment, id) {
            debug!(%segment, temp_var = id, "ignoring undeclared temp variable");
            return false;
        }
        self.values
            .entry(segment)
            .or_default()
            .insert(id.to_string(), value);
        true
    }

    /// Value published in the current pass, if any.
    #[must_use]
    pub fn read(&self, segment: SegmentId, id: &str) -> Option<&str> {
        self.values
            .get(&segment)
            .and_then(|values| values.get(id))
            .map(String::as_str)
    }

    /// Clear all values at the start of a pass.
    pub fn invalidate_all(&mut self) {
        self.values.clear();
    }

    /// Clear one segment's values.
    pub fn invalidate(&mut self, segment: SegmentId) {
        self.values.remove(&segment);
    }
}
