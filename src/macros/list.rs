//! Ordered collection of macros with generational handles.

use slotmap::{new_key_type, SlotMap};

use super::definition::Macro;
use crate::error::AutomacroError;

new_key_type! {
    /// Generational handle to a macro inside a [`MacroList`].
    pub struct MacroKey;
}

/// All macros of a document, in document order.
#[derive(Debug, Default)]
pub struct MacroList {
    slots: SlotMap<MacroKey, Macro>,
    order: Vec<MacroKey>,
}

impl MacroList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a macro.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or already used.
    pub fn insert(&mut self, item: Macro) -> Result<MacroKey, AutomacroError> {
        if item.name().trim().is_empty() {
            return Err(AutomacroError::Parse(
                "Macro name must not be empty".to_string(),
            ));
        }
        if self.find(item.name()).is_some() {
            return Err(AutomacroError::Document(format!(
                "Macro '{}' already exists",
                item.name()
            )));
        }
        let key = self.slots.insert(item);
        self.order.push(key);
        Ok(key)
    }

    /// Remove a macro by name. Handles to it become stale.
    pub fn remove(&mut self, name: &str) -> Option<Macro> {
        let key = self.find(name)?;
        self.order.retain(|k| *k != key);
        self.slots.remove(key)
    }

    /// Handle of the macro with this name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<MacroKey> {
        self.order
            .iter()
            .copied()
            .find(|key| self.slots.get(*key).is_some_and(|m| m.name() == name))
    }

    /// Macro by handle. Stale handles yield `None`.
    #[must_use]
    pub fn get(&self, key: MacroKey) -> Option<&Macro> {
        self.slots.get(key)
    }

    /// Mutable macro by handle.
    pub fn get_mut(&mut self, key: MacroKey) -> Option<&mut Macro> {
        self.slots.get_mut(key)
    }

    /// Macro by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Macro> {
        self.find(name).and_then(|key| self.slots.get(key))
    }

    /// Mutable macro by name.
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Macro> {
        let key = self.find(name)?;
        self.slots.get_mut(key)
    }

    /// Rename a macro. References by the old name stop resolving.
    ///
    /// # Errors
    ///
    /// Returns an error if the macro does not exist or the new name is taken.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), AutomacroError> {
        if self.find(to).is_some() {
            return Err(AutomacroError::Document(format!(
                "Macro '{to}' already exists"
            )));
        }
        let item = self
            .by_name_mut(from)
            .ok_or_else(|| AutomacroError::NotFound(format!("Macro '{from}'")))?;
        item.set_name(to);
        Ok(())
    }

    /// Handles in document order.
    #[must_use]
    pub fn keys(&self) -> Vec<MacroKey> {
        self.order.clone()
    }

    /// Macros in document order.
    pub fn iter(&self) -> impl Iterator<Item = (MacroKey, &Macro)> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.slots.get(*key).map(|m| (*key, m)))
    }

    /// Number of macros.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_order() {
        let mut list = MacroList::new();
        list.insert(Macro::new("b")).unwrap();
        list.insert(Macro::new("a")).unwrap();

        let names: Vec<&str> = list.iter().map(|(_, m)| m.name()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_duplicate_and_empty_names_rejected() {
        let mut list = MacroList::new();
        list.insert(Macro::new("a")).unwrap();
        assert!(list.insert(Macro::new("a")).is_err());
        assert!(list.insert(Macro::new("")).is_err());
    }

    #[test]
    fn test_removed_key_is_stale() {
        let mut list = MacroList::new();
        let key = list.insert(Macro::new("a")).unwrap();
        assert!(list.remove("a").is_some());
        assert!(list.get(key).is_none());

        let new_key = list.insert(Macro::new("a")).unwrap();
        assert_ne!(key, new_key);
        assert!(list.get(key).is_none());
    }

    #[test]
    fn test_rename() {
        let mut list = MacroList::new();
        list.insert(Macro::new("a")).unwrap();
        list.insert(Macro::new("b")).unwrap();

        assert!(list.rename("a", "b").is_err());
        list.rename("a", "c").unwrap();
        assert!(list.find("a").is_none());
        assert!(list.find("c").is_some());
    }
}
