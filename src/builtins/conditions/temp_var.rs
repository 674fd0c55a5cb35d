//! Compare a temp variable published earlier in the same pass.

use serde::{Deserialize, Serialize};

use crate::engine::EvalContext;
use crate::error::AutomacroError;
use crate::macros::{load_settings, save_settings, Condition, SegmentData};
use crate::variables::{parse_number, substitute, TempVarRef, VariableStore};

pub(super) const ID: &str = "temp_var";

/// Comparison performed on the temp variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempVarCheck {
    /// Value equals the text.
    #[default]
    Equals,
    /// Value differs from the text.
    NotEquals,
    /// Value contains the text.
    Contains,
    /// Numeric value is below the text's number.
    LessThan,
    /// Numeric value is above the text's number.
    GreaterThan,
    /// Value is empty.
    IsEmpty,
}

impl TempVarCheck {
    /// Evaluate the comparison.
    #[must_use]
    pub fn evaluate(self, value: &str, expected: &str) -> bool {
        let numbers = || parse_number(value).zip(parse_number(expected));
        match self {
            Self::Equals => value == expected,
            Self::NotEquals => value != expected,
            Self::Contains => value.contains(expected),
            Self::LessThan => numbers().is_some_and(|(a, b)| a < b),
            Self::GreaterThan => numbers().is_some_and(|(a, b)| a > b),
            Self::IsEmpty => value.is_empty(),
        }
    }

    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "does not equal",
            Self::Contains => "contains",
            Self::LessThan => "is less than",
            Self::GreaterThan => "is greater than",
            Self::IsEmpty => "is empty",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    temp_var: TempVarRef,
    condition: TempVarCheck,
    value: String,
}

/// Condition on a temp variable of an earlier condition of the same macro.
///
/// The temp variable is absent until its producer has run in the current
/// pass; an absent value makes the condition false.
#[derive(Debug, Default)]
pub struct TempVarCondition {
    settings: Settings,
}

impl TempVarCondition {
    /// Compare temp variable `id` of condition `index`.
    #[must_use]
    pub fn new(index: usize, id: &str, condition: TempVarCheck) -> Self {
        Self {
            settings: Settings {
                temp_var: TempVarRef::new(index, id),
                condition,
                value: String::new(),
            },
        }
    }

    /// Text to compare against. May contain `${name}`.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.settings.value = value.into();
        self
    }
}

impl Condition for TempVarCondition {
    fn id(&self) -> &'static str {
        ID
    }

    fn check(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        let expected = substitute(&self.settings.value, ctx.variables());
        ctx.read_temp_var(&self.settings.temp_var)
            .is_some_and(|value| self.settings.condition.evaluate(value, &expected))
    }

    fn save(&self, data: &mut SegmentData) -> Result<(), AutomacroError> {
        save_settings(&self.settings, data)
    }

    fn load(&mut self, data: &SegmentData) -> Result<(), AutomacroError> {
        self.settings = load_settings(data)?;
        Ok(())
    }

    fn short_description(&self) -> String {
        let settings = &self.settings;
        format!(
            "condition {} '{}' {} \"{}\"",
            settings.temp_var.index,
            settings.temp_var.id,
            settings.condition.display_name(),
            settings.value
        )
    }

    fn resolve_variables_to_fixed_values(&mut self, variables: &VariableStore) {
        self.settings.value = substitute(&self.settings.value, variables);
    }
}
