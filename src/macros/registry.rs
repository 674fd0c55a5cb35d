//! Registry of condition and action types.
//!
//! A [`Registry`] is built once at startup and passed to whatever needs to
//! create segments, such as document loading. Type ids are unique per kind;
//! registering an id twice is rejected.

use std::collections::BTreeMap;

use tracing::warn;

use super::action::Action;
use super::condition::Condition;

/// Creates a fresh condition with default settings.
pub type ConditionFactory = Box<dyn Fn() -> Box<dyn Condition> + Send + Sync>;

/// Creates a fresh action with default settings.
pub type ActionFactory = Box<dyn Fn() -> Box<dyn Action> + Send + Sync>;

struct Entry<F> {
    display_name: String,
    create: F,
}

/// Summary of a registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentType {
    /// Persisted type id.
    pub id: String,
    /// Label shown to users.
    pub display_name: String,
}

/// Known condition and action types.
#[derive(Default)]
pub struct Registry {
    conditions: BTreeMap<String, Entry<ConditionFactory>>,
    actions: BTreeMap<String, Entry<ActionFactory>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a condition type. Returns `false` if the id is taken.
    pub fn register_condition<F>(&mut self, id: &str, display_name: &str, create: F) -> bool
    where
        F: Fn() -> Box<dyn Condition> + Send + Sync + 'static,
    {
        if self.conditions.contains_key(id) {
            warn!(condition = id, "condition type already registered");
            return false;
        }
        self.conditions.insert(
            id.to_string(),
            Entry {
                display_name: display_name.to_string(),
                create: Box::new(create),
            },
        );
        true
    }

    /// Register an action type. Returns `false` if the id is taken.
    pub fn register_action<F>(&mut self, id: &str, display_name: &str, create: F) -> bool
    where
        F: Fn() -> Box<dyn Action> + Send + Sync + 'static,
    {
        if self.actions.contains_key(id) {
            warn!(action = id, "action type already registered");
            return false;
        }
        self.actions.insert(
            id.to_string(),
            Entry {
                display_name: display_name.to_string(),
                create: Box::new(create),
            },
        );
        true
    }

    /// Create a condition of a registered type.
    #[must_use]
    pub fn create_condition(&self, id: &str) -> Option<Box<dyn Condition>> {
        self.conditions.get(id).map(|entry| (entry.create)())
    }

    /// Create an action of a registered type.
    #[must_use]
    pub fn create_action(&self, id: &str) -> Option<Box<dyn Action>> {
        self.actions.get(id).map(|entry| (entry.create)())
    }

    /// Condition type id for a display name.
    #[must_use]
    pub fn condition_id_from_display_name(&self, name: &str) -> Option<&str> {
        Self::id_from_display_name(&self.conditions, name)
    }

    /// Action type id for a display name.
    #[must_use]
    pub fn action_id_from_display_name(&self, name: &str) -> Option<&str> {
        Self::id_from_display_name(&self.actions, name)
    }

    /// Display name of a condition type.
    #[must_use]
    pub fn condition_display_name(&self, id: &str) -> Option<&str> {
        self.conditions.get(id).map(|e| e.display_name.as_str())
    }

    /// Display name of an action type.
    #[must_use]
    pub fn action_display_name(&self, id: &str) -> Option<&str> {
        self.actions.get(id).map(|e| e.display_name.as_str())
    }

    /// Registered condition types, sorted by id.
    #[must_use]
    pub fn condition_types(&self) -> Vec<SegmentType> {
        Self::types(&self.conditions)
    }

    /// Registered action types, sorted by id.
    #[must_use]
    pub fn action_types(&self) -> Vec<SegmentType> {
        Self::types(&self.actions)
    }

    fn id_from_display_name<'a, F>(
        entries: &'a BTreeMap<String, Entry<F>>,
        name: &str,
    ) -> Option<&'a str> {
        entries
            .iter()
            .find(|(_, entry)| entry.display_name == name)
            .map(|(id, _)| id.as_str())
    }

    fn types<F>(entries: &BTreeMap<String, Entry<F>>) -> Vec<SegmentType> {
        entries
            .iter()
            .map(|(id, entry)| SegmentType {
                id: id.clone(),
                display_name: entry.display_name.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EvalContext;
    use crate::error::AutomacroError;
    use crate::macros::SegmentData;

    struct Never;

    impl Condition for Never {
        fn id(&self) -> &'static str {
            "never"
        }

        fn check(&mut self, _ctx: &mut EvalContext<'_>) -> bool {
            false
        }

        fn save(&self, _data: &mut SegmentData) -> Result<(), AutomacroError> {
            Ok(())
        }

        fn load(&mut self, _data: &SegmentData) -> Result<(), AutomacroError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = Registry::new();
        assert!(registry.register_condition("never", "Never", || Box::new(Never)));

        let condition = registry.create_condition("never").unwrap();
        assert_eq!(condition.id(), "never");
        assert!(registry.create_condition("missing").is_none());
        assert!(registry.create_action("never").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = Registry::new();
        assert!(registry.register_condition("never", "Never", || Box::new(Never)));
        assert!(!registry.register_condition("never", "Other", || Box::new(Never)));
        assert_eq!(registry.condition_display_name("never"), Some("Never"));
    }

    #[test]
    fn test_id_from_display_name() {
        let mut registry = Registry::new();
        registry.register_condition("never", "Never", || Box::new(Never));
        assert_eq!(registry.condition_id_from_display_name("Never"), Some("never"));
        assert_eq!(registry.condition_id_from_display_name("Nope"), None);
        assert_eq!(registry.condition_types().len(), 1);
    }
}
