//! The condition plugin contract.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::duration::DurationModifier;
use super::list::MacroList;
use super::logic::LogicType;
use super::segment::{SegmentData, SegmentInfo};
use crate::engine::EvalContext;
use crate::error::AutomacroError;
use crate::variables::{TempVarDecl, VariableStore};

/// A pluggable boolean check.
///
/// `check` is called exactly once per evaluation pass for every enabled
/// condition, whatever the outcome of the surrounding fold. Conditions that
/// detect change keep their own baseline and refresh it on every call.
/// A condition that cannot evaluate returns `false`; it never panics.
pub trait Condition: Send {
    /// Stable type identifier, persisted as the entry's `id`.
    fn id(&self) -> &'static str;

    /// Evaluate the condition.
    fn check(&mut self, ctx: &mut EvalContext<'_>) -> bool;

    /// Write type-specific fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be serialized.
    fn save(&self, data: &mut SegmentData) -> Result<(), AutomacroError>;

    /// Read type-specific fields. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if present fields are malformed.
    fn load(&mut self, data: &SegmentData) -> Result<(), AutomacroError>;

    /// One-line summary for listings.
    fn short_description(&self) -> String {
        String::new()
    }

    /// Temp variables this condition publishes in its current configuration.
    fn temp_vars(&self) -> Vec<TempVarDecl> {
        Vec::new()
    }

    /// Re-resolve macro references once the whole document is loaded.
    fn post_load(&mut self, _macros: &MacroList) {}

    /// Replace `${name}` templates with the variables' current values.
    fn resolve_variables_to_fixed_values(&mut self, _variables: &VariableStore) {}
}

/// A condition together with its position-dependent settings.
pub struct ConditionEntry {
    /// Shared segment flags.
    pub info: SegmentInfo,
    /// How the result joins the fold.
    pub logic: LogicType,
    /// Time-based post-processing of the result.
    pub duration: DurationModifier,
    /// The condition itself.
    pub condition: Box<dyn Condition>,
}

impl ConditionEntry {
    /// Wrap a condition with default settings.
    #[must_use]
    pub fn new(condition: Box<dyn Condition>) -> Self {
        Self {
            info: SegmentInfo::new(),
            logic: LogicType::default(),
            duration: DurationModifier::default(),
            condition,
        }
    }

    /// Set the logic operator.
    #[must_use]
    pub const fn with_logic(mut self, logic: LogicType) -> Self {
        self.logic = logic;
        self
    }

    /// Set the duration modifier.
    #[must_use]
    pub fn with_duration(mut self, duration: DurationModifier) -> Self {
        self.duration = duration;
        self
    }

    /// Disable the entry.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.info.enabled = false;
        self
    }
}

impl fmt::Debug for ConditionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionEntry")
            .field("id", &self.condition.id())
            .field("segment", &self.info.id)
            .field("enabled", &self.info.enabled)
            .field("logic", &self.logic)
            .field("duration", &self.duration.kind)
            .finish()
    }
}

/// Serialize a settings struct into a segment object.
///
/// # Errors
///
/// Returns an error if the settings do not serialize to an object.
pub fn save_settings<T: Serialize>(
    settings: &T,
    data: &mut SegmentData,
) -> Result<(), AutomacroError> {
    match serde_json::to_value(settings)? {
        serde_json::Value::Object(map) => {
            data.extend(map);
            Ok(())
        }
        other => Err(AutomacroError::Document(format!(
            "Segment settings must be an object, got {other}"
        ))),
    }
}

/// Deserialize a settings struct from a segment object.
///
/// Unknown keys are ignored, so the shared entry fields do not interfere.
///
/// # Errors
///
/// Returns an error if a present field has the wrong shape.
pub fn load_settings<T: DeserializeOwned>(data: &SegmentData) -> Result<T, AutomacroError> {
    serde_json::from_value(serde_json::Value::Object(data.clone()))
        .map_err(|e| AutomacroError::Document(format!("Failed to load segment settings: {e}")))
}
