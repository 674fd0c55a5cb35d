//! Compare a named variable.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::engine::EvalContext;
use crate::error::AutomacroError;
use crate::macros::{load_settings, save_settings, Condition, SegmentData};
use crate::storage::migrate::{map_int, rename_key, set_version, Migrations};
use crate::variables::{parse_number, substitute, TempVarDecl, Variable, VariableRef, VariableStore};

pub(super) const ID: &str = "variable";

const MIGRATIONS: Migrations = Migrations::new("variable condition", &[settings_v1]);

/// Comparison performed on the variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableCheck {
    /// Value equals the text, or the regular expression matches all of it
    /// (any part of it with partial matching).
    #[default]
    Equals,
    /// Value is empty.
    IsEmpty,
    /// Value parses as a number.
    IsNumber,
    /// Numeric value is below the number.
    LessThan,
    /// Numeric value is above the number.
    GreaterThan,
    /// Value differs from the one seen at the previous check.
    ValueChanged,
    /// Value equals the second variable's value, textually or numerically.
    EqualsVariable,
    /// Numeric value is below the second variable's.
    LessThanVariable,
    /// Numeric value is above the second variable's.
    GreaterThanVariable,
}

impl VariableCheck {
    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::IsEmpty => "is empty",
            Self::IsNumber => "is a number",
            Self::LessThan => "is less than",
            Self::GreaterThan => "is greater than",
            Self::ValueChanged => "changed",
            Self::EqualsVariable => "equals variable",
            Self::LessThanVariable => "is less than variable",
            Self::GreaterThanVariable => "is greater than variable",
        }
    }

    /// Map a persisted code from settings without a version.
    #[must_use]
    pub const fn from_legacy_code(code: i64) -> Self {
        match code {
            1 => Self::IsEmpty,
            2 => Self::IsNumber,
            3 => Self::LessThan,
            4 => Self::GreaterThan,
            5 => Self::ValueChanged,
            6 => Self::EqualsVariable,
            7 => Self::LessThanVariable,
            8 => Self::GreaterThanVariable,
            _ => Self::Equals,
        }
    }

    const fn uses_second_variable(self) -> bool {
        matches!(
            self,
            Self::EqualsVariable | Self::LessThanVariable | Self::GreaterThanVariable
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    variable: VariableRef,
    #[serde(skip_serializing_if = "VariableRef::is_empty")]
    variable2: VariableRef,
    condition: VariableCheck,
    value: String,
    number: f64,
    regex: bool,
    partial_match: bool,
}

/// Condition on the value of a variable.
///
/// Publishes the variable's current value as temp variable `value`. A missing
/// variable makes the condition false.
#[derive(Debug, Default)]
pub struct VariableCondition {
    settings: Settings,
    last_value: String,
    compiled: Option<(String, Regex)>,
}

impl VariableCondition {
    /// Create a condition.
    #[must_use]
    pub fn new(variable: &str, condition: VariableCheck) -> Self {
        Self {
            settings: Settings {
                variable: VariableRef::new(variable),
                condition,
                ..Settings::default()
            },
            ..Self::default()
        }
    }

    /// Text compared by [`VariableCheck::Equals`]. May contain `${name}`.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.settings.value = value.into();
        self
    }

    /// Treat the text as a regular expression.
    #[must_use]
    pub const fn with_regex(mut self, regex: bool) -> Self {
        self.settings.regex = regex;
        self
    }

    /// Let the regular expression match anywhere in the value.
    #[must_use]
    pub const fn with_partial_match(mut self, partial: bool) -> Self {
        self.settings.partial_match = partial;
        self
    }

    /// Number for the numeric comparisons.
    #[must_use]
    pub const fn with_number(mut self, number: f64) -> Self {
        self.settings.number = number;
        self
    }

    /// Second variable for the variable-to-variable comparisons.
    #[must_use]
    pub fn with_variable2(mut self, variable: &str) -> Self {
        self.settings.variable2 = VariableRef::new(variable);
        self
    }

    fn matches_text(&mut self, value: &str, variables: &VariableStore) -> bool {
        let expected = substitute(&self.settings.value, variables);
        if !self.settings.regex {
            return value == expected;
        }
        let expected = if self.settings.partial_match {
            expected
        } else {
            format!(r"\A(?:{expected})\z")
        };

        let cached = self
            .compiled
            .as_ref()
            .is_some_and(|(pattern, _)| *pattern == expected);
        if !cached {
            match Regex::new(&expected) {
                Ok(regex) => self.compiled = Some((expected, regex)),
                Err(e) => {
                    debug!(pattern = %expected, "invalid regular expression: {e}");
                    self.compiled = None;
                    return false;
                }
            }
        }
        self.compiled
            .as_ref()
            .is_some_and(|(_, regex)| regex.is_match(value))
    }

    fn compare_variables(&mut self, value: &str, variables: &VariableStore) -> bool {
        let Some(other) = self.settings.variable2.get(variables).map(Variable::value) else {
            return false;
        };
        let numbers = parse_number(value).zip(parse_number(&other));
        match self.settings.condition {
            VariableCheck::EqualsVariable => {
                value == other || numbers.is_some_and(|(a, b)| (a - b).abs() < f64::EPSILON)
            }
            VariableCheck::LessThanVariable => numbers.is_some_and(|(a, b)| a < b),
            VariableCheck::GreaterThanVariable => numbers.is_some_and(|(a, b)| a > b),
            _ => false,
        }
    }
}

impl Condition for VariableCondition {
    fn id(&self) -> &'static str {
        ID
    }

    fn check(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        let Some(value) = self.settings.variable.get(ctx.variables()).map(Variable::value) else {
            return false;
        };
        ctx.publish_temp_var("value", value.clone());

        match self.settings.condition {
            VariableCheck::Equals => self.matches_text(&value, ctx.variables()),
            VariableCheck::IsEmpty => value.is_empty(),
            VariableCheck::IsNumber => parse_number(&value).is_some(),
            VariableCheck::LessThan => parse_number(&value).is_some_and(|n| n < self.settings.number),
            VariableCheck::GreaterThan => {
                parse_number(&value).is_some_and(|n| n > self.settings.number)
            }
            VariableCheck::ValueChanged => {
                let changed = value != self.last_value;
                self.last_value = value;
                changed
            }
            check if check.uses_second_variable() => self.compare_variables(&value, ctx.variables()),
            _ => false,
        }
    }

    fn save(&self, data: &mut SegmentData) -> Result<(), AutomacroError> {
        save_settings(&self.settings, data)?;
        set_version(data, MIGRATIONS.current_version());
        Ok(())
    }

    fn load(&mut self, data: &SegmentData) -> Result<(), AutomacroError> {
        let mut data = data.clone();
        MIGRATIONS.run(&mut data)?;
        self.settings = load_settings(&data)?;
        self.compiled = None;
        Ok(())
    }

    fn short_description(&self) -> String {
        let settings = &self.settings;
        match settings.condition {
            VariableCheck::Equals => format!("{} equals \"{}\"", settings.variable, settings.value),
            VariableCheck::LessThan | VariableCheck::GreaterThan => format!(
                "{} {} {}",
                settings.variable,
                settings.condition.display_name(),
                settings.number
            ),
            check if check.uses_second_variable() => format!(
                "{} {} {}",
                settings.variable,
                check.display_name(),
                settings.variable2
            ),
            check => format!("{} {}", settings.variable, check.display_name()),
        }
    }

    fn temp_vars(&self) -> Vec<TempVarDecl> {
        vec![TempVarDecl::new("value", "Value")
            .with_description("Value of the variable at the time of the check")]
    }

    fn resolve_variables_to_fixed_values(&mut self, variables: &VariableStore) {
        self.settings.value = substitute(&self.settings.value, variables);
        self.compiled = None;
    }
}

/// Migration v1: snake case keys and a named comparison.
fn settings_v1(data: &mut SegmentData) -> Result<(), AutomacroError> {
    rename_key(data, "variableName", "variable");
    rename_key(data, "variable2Name", "variable2");
    rename_key(data, "strValue", "value");
    rename_key(data, "numValue", "number");
    map_int(data, "condition", |code| {
        serde_json::to_value(VariableCheck::from_legacy_code(code)).unwrap_or_default()
    });
    // Options object first; an old plain `regex` flag overrides its `enable`.
    let config = data.remove("regexConfig");
    let config = match data.remove("regex") {
        Some(Value::Object(regex)) => Some(Value::Object(regex)),
        Some(flag @ Value::Bool(_)) => {
            data.insert("regex".to_string(), flag);
            config
        }
        _ => config,
    };
    if let Some(Value::Object(config)) = config {
        let flag = |key: &str| config.get(key).and_then(Value::as_bool).unwrap_or(false);
        data.entry("regex").or_insert_with(|| Value::from(flag("enable")));
        data.insert("partial_match".to_string(), Value::from(flag("partial")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CancellationController, Document, EngineConfig};
    use crate::macros::{LogicType, Macro};
    use serde_json::json;

    fn document(condition: VariableCondition, variables: &[(&str, &str)]) -> Document {
        let mut document = Document::new();
        for (name, value) in variables {
            document
                .variables_mut()
                .insert(Variable::new(*name).with_value(*value))
                .unwrap();
        }
        document
            .add_macro(Macro::new("m").with_condition(LogicType::And, Box::new(condition)))
            .unwrap();
        document
    }

    fn matched_after_tick(document: &mut Document) -> bool {
        document.tick(&CancellationController::new(), &EngineConfig::default());
        document.macros().by_name("m").unwrap().matched()
    }

    fn check(condition: VariableCondition, variables: &[(&str, &str)]) -> bool {
        matched_after_tick(&mut document(condition, variables))
    }

    #[test]
    fn test_equals_and_regex() {
        let plain = VariableCondition::new("v", VariableCheck::Equals).with_value("hello");
        assert!(check(plain, &[("v", "hello")]));

        let regex = VariableCondition::new("v", VariableCheck::Equals)
            .with_value("^he.*o$")
            .with_regex(true);
        assert!(check(regex, &[("v", "hello")]));

        let anchored = VariableCondition::new("v", VariableCheck::Equals)
            .with_value("on")
            .with_regex(true);
        assert!(!check(anchored, &[("v", "only")]));

        let alternation = VariableCondition::new("v", VariableCheck::Equals)
            .with_value("a|b")
            .with_regex(true);
        assert!(!check(alternation, &[("v", "ab")]));

        let partial = VariableCondition::new("v", VariableCheck::Equals)
            .with_value("on")
            .with_regex(true)
            .with_partial_match(true);
        assert!(check(partial, &[("v", "only")]));

        let invalid = VariableCondition::new("v", VariableCheck::Equals)
            .with_value("(")
            .with_regex(true);
        assert!(!check(invalid, &[("v", "(")]));
    }

    #[test]
    fn test_equals_substitutes_variables() {
        let condition = VariableCondition::new("v", VariableCheck::Equals).with_value("${other}");
        assert!(check(condition, &[("v", "same"), ("other", "same")]));
    }

    #[test]
    fn test_numeric_checks() {
        assert!(check(
            VariableCondition::new("v", VariableCheck::LessThan).with_number(5.0),
            &[("v", "4.5")]
        ));
        assert!(!check(
            VariableCondition::new("v", VariableCheck::GreaterThan).with_number(5.0),
            &[("v", "abc")]
        ));
        assert!(check(
            VariableCondition::new("v", VariableCheck::IsNumber),
            &[("v", " 12 ")]
        ));
        assert!(check(VariableCondition::new("v", VariableCheck::IsEmpty), &[("v", "")]));
    }

    #[test]
    fn test_variable_to_variable() {
        let equals = VariableCondition::new("a", VariableCheck::EqualsVariable).with_variable2("b");
        assert!(check(equals, &[("a", "1.0"), ("b", "1")]));

        let less = VariableCondition::new("a", VariableCheck::LessThanVariable).with_variable2("b");
        assert!(check(less, &[("a", "1"), ("b", "2")]));

        let missing =
            VariableCondition::new("a", VariableCheck::GreaterThanVariable).with_variable2("zz");
        assert!(!check(missing, &[("a", "3")]));
    }

    #[test]
    fn test_missing_variable_is_false() {
        assert!(!check(VariableCondition::new("nope", VariableCheck::IsEmpty), &[]));
    }

    #[test]
    fn test_value_changed_refreshes_baseline() {
        let mut document = document(
            VariableCondition::new("v", VariableCheck::ValueChanged),
            &[("v", "a")],
        );
        assert!(matched_after_tick(&mut document));
        assert!(!matched_after_tick(&mut document));

        document.variables_mut().set_value("v", "b");
        assert!(matched_after_tick(&mut document));
        assert!(!matched_after_tick(&mut document));
    }

    #[test]
    fn test_publishes_value() {
        let mut document = document(
            VariableCondition::new("v", VariableCheck::IsEmpty),
            &[("v", "published")],
        );
        document.tick(&CancellationController::new(), &EngineConfig::default());
        let segment = document.macros().by_name("m").unwrap().conditions()[0].info.id;
        assert_eq!(document.temp_vars().read(segment, "value"), Some("published"));
    }

    #[test]
    fn test_legacy_settings_migrated() {
        let data = match json!({
            "variableName": "v",
            "strValue": "x",
            "numValue": 2.0,
            "condition": 3
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let mut condition = VariableCondition::default();
        condition.load(&data).unwrap();
        assert_eq!(condition.settings.variable.name(), "v");
        assert_eq!(condition.settings.condition, VariableCheck::LessThan);
        assert!((condition.settings.number - 2.0).abs() < f64::EPSILON);

        let mut saved = SegmentData::new();
        condition.save(&mut saved).unwrap();
        assert_eq!(saved.get("version"), Some(&json!(1)));
        assert_eq!(saved.get("condition"), Some(&json!("less_than")));
    }

    #[test]
    fn test_legacy_regex_settings() {
        let load = |value: serde_json::Value| {
            let serde_json::Value::Object(data) = value else {
                unreachable!()
            };
            let mut condition = VariableCondition::default();
            condition.load(&data).unwrap();
            condition.settings
        };

        let flag = load(json!({"variableName": "v", "strValue": "o.", "regex": true}));
        assert!(flag.regex);
        assert!(!flag.partial_match);

        let object = load(json!({
            "variableName": "v",
            "strValue": "o.",
            "regex": {"enable": true, "partial": true, "options": 0}
        }));
        assert!(object.regex);
        assert!(object.partial_match);

        let disabled = load(json!({"regex": {"enable": false, "partial": false}}));
        assert!(!disabled.regex);

        let config = load(json!({"regexConfig": {"enable": true, "partial": false}}));
        assert!(config.regex);
        assert!(!config.partial_match);

        let overridden = load(json!({
            "regexConfig": {"enable": false, "partial": true},
            "regex": true
        }));
        assert!(overridden.regex);
        assert!(overridden.partial_match);
    }

    #[test]
    fn test_resolve_variables_to_fixed_values() {
        let mut store = VariableStore::new();
        store.insert(Variable::new("x").with_value("frozen")).unwrap();
        let mut condition = VariableCondition::new("v", VariableCheck::Equals).with_value("${x}!");
        condition.resolve_variables_to_fixed_values(&store);
        assert_eq!(condition.settings.value, "frozen!");
    }
}
