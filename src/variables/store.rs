//! Named, document-scoped variables.
//!
//! Variables live in a slot map keyed by [`VariableKey`]. Everything outside
//! the store refers to a variable by name through a [`VariableRef`], which
//! caches the generational key and falls back to a name lookup whenever the
//! key has gone stale (after a reload or a delete).

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, warn};

use crate::error::AutomacroError;

new_key_type! {
    /// Generational handle to a variable inside a [`VariableStore`].
    pub struct VariableKey;
}

/// What happens to a variable's value across save and load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveAction {
    /// The value is not persisted and starts out empty.
    DontSave,
    /// The current value is persisted.
    #[default]
    Save,
    /// The value is reset to the default value on load.
    SetDefault,
}

impl SaveAction {
    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::DontSave => "Don't save",
            Self::Save => "Save",
            Self::SetDefault => "Set to default",
        }
    }
}

/// A value accepted by [`Variable::set_value`].
///
/// Numbers are converted with [`canonical_number`] so that setting `123.0`
/// and setting `"123"` leave the variable in the same state.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    /// Text stored as is.
    Text(String),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
}

impl VariableValue {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Int(value) => value.to_string(),
            Self::Float(value) => canonical_number(value),
        }
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for VariableValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for VariableValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Canonical text form of a number: `123.0` becomes `"123"`, `123.123`
/// stays `"123.123"`.
#[must_use]
pub fn canonical_number(value: f64) -> String {
    // f64's Display is the shortest round-trip form and omits a zero fraction.
    format!("{value}")
}

/// Parse a variable's text as a number.
#[must_use]
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

/// A named value shared between macros.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    value: String,
    previous_value: String,
    default_value: String,
    save_action: SaveAction,
    last_used: Cell<Option<Instant>>,
    last_changed: Option<Instant>,
    change_count: u64,
}

impl Variable {
    /// Create an empty variable.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
            previous_value: String::new(),
            default_value: String::new(),
            save_action: SaveAction::default(),
            last_used: Cell::new(None),
            last_changed: None,
            change_count: 0,
        }
    }

    /// Set the initial value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<VariableValue>) -> Self {
        self.value = value.into().into_text();
        self
    }

    /// Set the default value.
    #[must_use]
    pub fn with_default_value(mut self, value: impl Into<VariableValue>) -> Self {
        self.default_value = value.into().into_text();
        self
    }

    /// Set the save policy.
    #[must_use]
    pub const fn with_save_action(mut self, save_action: SaveAction) -> Self {
        self.save_action = save_action;
        self
    }

    /// Variable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value. Marks the variable as used.
    #[must_use]
    pub fn value(&self) -> String {
        self.touch();
        self.value.clone()
    }

    /// Current value without marking the variable as used.
    #[must_use]
    pub fn peek(&self) -> &str {
        &self.value
    }

    /// Current value as a number, if it parses as one. Marks the variable as used.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        self.touch();
        parse_number(&self.value)
    }

    /// Value before the most recent change.
    #[must_use]
    pub fn previous_value(&self) -> &str {
        &self.previous_value
    }

    /// Default value.
    #[must_use]
    pub fn default_value(&self) -> &str {
        &self.default_value
    }

    /// Change the default value.
    pub fn set_default_value(&mut self, value: impl Into<VariableValue>) {
        self.default_value = value.into().into_text();
    }

    /// Save policy.
    #[must_use]
    pub const fn save_action(&self) -> SaveAction {
        self.save_action
    }

    /// Change the save policy.
    pub fn set_save_action(&mut self, save_action: SaveAction) {
        self.save_action = save_action;
    }

    /// Set a new value. Marks the variable as used.
    pub fn set_value(&mut self, value: impl Into<VariableValue>) {
        self.touch();
        let value = value.into().into_text();
        if value == self.value {
            return;
        }
        self.previous_value = std::mem::replace(&mut self.value, value);
        self.last_changed = Some(Instant::now());
        self.change_count = self.change_count.saturating_add(1);
    }

    /// Time since the value was last read or written, if ever.
    #[must_use]
    pub fn since_last_use(&self) -> Option<Duration> {
        self.last_used.get().map(|at| at.elapsed())
    }

    /// Time since the value last changed, if ever.
    #[must_use]
    pub fn since_last_change(&self) -> Option<Duration> {
        self.last_changed.map(|at| at.elapsed())
    }

    /// Number of value changes since creation or load.
    #[must_use]
    pub const fn change_count(&self) -> u64 {
        self.change_count
    }

    fn touch(&self) {
        self.last_used.set(Some(Instant::now()));
    }
}

/// Persisted form of a variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedVariable {
    /// Variable name.
    pub name: String,
    /// Stored value, present only for [`SaveAction::Save`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Default value.
    pub default_value: String,
    /// Save policy.
    pub save_action: SaveAction,
}

impl From<&Variable> for SavedVariable {
    fn from(variable: &Variable) -> Self {
        Self {
            name: variable.name.clone(),
            value: (variable.save_action == SaveAction::Save).then(|| variable.value.clone()),
            default_value: variable.default_value.clone(),
            save_action: variable.save_action,
        }
    }
}

impl From<SavedVariable> for Variable {
    fn from(saved: SavedVariable) -> Self {
        let value = match saved.save_action {
            SaveAction::Save => saved.value.unwrap_or_default(),
            SaveAction::SetDefault => saved.default_value.clone(),
            SaveAction::DontSave => String::new(),
        };
        Self::new(saved.name)
            .with_value(value)
            .with_default_value(saved.default_value)
            .with_save_action(saved.save_action)
    }
}

/// All variables of a document.
#[derive(Debug, Default)]
pub struct VariableStore {
    slots: SlotMap<VariableKey, Variable>,
    by_name: HashMap<String, VariableKey>,
}

impl VariableStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or already taken.
    pub fn create(&mut self, name: &str) -> Result<VariableKey, AutomacroError> {
        self.insert(Variable::new(name))
    }

    /// Add a fully built variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or already taken.
    pub fn insert(&mut self, variable: Variable) -> Result<VariableKey, AutomacroError> {
        if variable.name.trim().is_empty() {
            return Err(AutomacroError::Parse(
                "Variable name must not be empty".to_string(),
            ));
        }
        if self.by_name.contains_key(&variable.name) {
            return Err(AutomacroError::Document(format!(
                "Variable '{}' already exists",
                variable.name
            )));
        }
        let name = variable.name.clone();
        let key = self.slots.insert(variable);
        self.by_name.insert(name, key);
        Ok(key)
    }

    /// Look up a variable's handle by name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<VariableKey> {
        self.by_name.get(name).copied()
    }

    /// Variable by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.resolve(name).and_then(|key| self.slots.get(key))
    }

    /// Mutable variable by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        let key = self.resolve(name)?;
        self.slots.get_mut(key)
    }

    /// Variable by handle. Stale handles yield `None`.
    #[must_use]
    pub fn get_by_key(&self, key: VariableKey) -> Option<&Variable> {
        self.slots.get(key)
    }

    /// Mutable variable by handle. Stale handles yield `None`.
    pub fn get_by_key_mut(&mut self, key: VariableKey) -> Option<&mut Variable> {
        self.slots.get_mut(key)
    }

    /// Current value of a variable by name.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<String> {
        self.get(name).map(Variable::value)
    }

    /// Set a variable's value by name. Returns `false` if it does not exist.
    pub fn set_value(&mut self, name: &str, value: impl Into<VariableValue>) -> bool {
        self.get_mut(name).map_or(false, |variable| {
            variable.set_value(value);
            true
        })
    }

    /// Delete a variable. Outstanding handles to it become stale.
    pub fn delete(&mut self, name: &str) -> bool {
        let Some(key) = self.by_name.remove(name) else {
            return false;
        };
        self.slots.remove(key);
        debug!(variable = name, "deleted variable");
        true
    }

    /// Rename a variable. References by the old name no longer resolve.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable does not exist or the new name is taken.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), AutomacroError> {
        if self.by_name.contains_key(to) {
            return Err(AutomacroError::Document(format!(
                "Variable '{to}' already exists"
            )));
        }
        let key = self
            .by_name
            .remove(from)
            .ok_or_else(|| AutomacroError::NotFound(format!("Variable '{from}'")))?;
        if let Some(variable) = self.slots.get_mut(key) {
            variable.name = to.to_string();
        }
        self.by_name.insert(to.to_string(), key);
        Ok(())
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All variables, sorted by name.
    #[must_use]
    pub fn iter(&self) -> Vec<&Variable> {
        let mut variables: Vec<&Variable> = self.slots.values().collect();
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        variables
    }

    /// Persisted form of every variable, sorted by name.
    #[must_use]
    pub fn save(&self) -> Vec<SavedVariable> {
        self.iter().into_iter().map(SavedVariable::from).collect()
    }

    /// Replace the store's contents with persisted variables.
    ///
    /// Duplicate names keep the first entry.
    pub fn load(&mut self, saved: Vec<SavedVariable>) {
        self.slots.clear();
        self.by_name.clear();
        for entry in saved {
            let name = entry.name.clone();
            if let Err(e) = self.insert(Variable::from(entry)) {
                warn!(variable = %name, "skipping variable: {e}");
            }
        }
    }
}

/// A by-name reference to a variable.
///
/// The cached handle is only a shortcut: it is verified against the name on
/// every use and re-resolved when stale, so a deleted or recreated variable is
/// never read through an old handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct VariableRef {
    name: String,
    #[serde(skip)]
    cached: Option<VariableKey>,
}

impl VariableRef {
    /// Reference a variable by name.
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

    /// Resolve to a live handle, or `None` if the variable is absent.
    pub fn resolve(&mut self, store: &VariableStore) -> Option<VariableKey> {
        if let Some(key) = self.cached {
            if store.get_by_key(key).is_some_and(|v| v.name == self.name) {
                return Some(key);
            }
        }
        self.cached = store.resolve(&self.name);
        self.cached
    }

    /// The referenced variable, if present.
    pub fn get<'s>(&mut self, store: &'s VariableStore) -> Option<&'s Variable> {
        let key = self.resolve(store)?;
        store.get_by_key(key)
    }

    /// The referenced variable for mutation, if present.
    pub fn get_mut<'s>(&mut self, store: &'s mut VariableStore) -> Option<&'s mut Variable> {
        let key = self.resolve(store)?;
        store.get_by_key_mut(key)
    }
}

impl From<String> for VariableRef {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&str> for VariableRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<VariableRef> for String {
    fn from(reference: VariableRef) -> Self {
        reference.name
    }
}

impl fmt::Display for VariableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
