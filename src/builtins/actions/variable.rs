//! Modify a named variable.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::EvalContext;
use crate::error::AutomacroError;
use crate::macros::{load_settings, save_settings, Action, SegmentData};
use crate::storage::migrate::{rename_key, set_version, Migrations};
use crate::variables::{
    canonical_number, parse_number, substitute, TempVarRef, Variable, VariableRef, VariableStore,
};

pub(super) const ID: &str = "variable";

const MIGRATIONS: Migrations = Migrations::new("variable action", &[settings_v1]);

/// Operation applied to the variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableOperation {
    /// Replace the value with the text.
    #[default]
    Set,
    /// Append the text.
    Append,
    /// Append the second variable's value.
    AppendVariable,
    /// Add the number in the text.
    Increment,
    /// Subtract the number in the text.
    Decrement,
    /// Copy a temp variable of one of the macro's conditions.
    SetFromTempVar,
    /// Round a numeric value to the nearest integer.
    RoundToInt,
    /// Replace the value with its length in characters.
    StringLength,
    /// Strip surrounding whitespace.
    Trim,
    /// Convert to lower case.
    Lowercase,
    /// Convert to upper case.
    Uppercase,
    /// Replace every occurrence of a text or regular expression.
    FindAndReplace,
    /// Keep part of the value: a character range, or one match of a
    /// regular expression.
    Substring,
}

impl VariableOperation {
    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Append => "append",
            Self::AppendVariable => "append variable",
            Self::Increment => "increment",
            Self::Decrement => "decrement",
            Self::SetFromTempVar => "set from temp variable",
            Self::RoundToInt => "round to integer",
            Self::StringLength => "string length",
            Self::Trim => "trim",
            Self::Lowercase => "lowercase",
            Self::Uppercase => "uppercase",
            Self::FindAndReplace => "find and replace",
            Self::Substring => "substring",
        }
    }

    /// Map a persisted code from settings without a version.
    ///
    /// `case_type` picks the direction of the legacy change-case code.
    /// Operations without a counterpart map to `None`.
    #[must_use]
    pub const fn from_legacy_code(code: i64, case_type: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Set),
            1 => Some(Self::Append),
            2 => Some(Self::AppendVariable),
            3 => Some(Self::Increment),
            4 => Some(Self::Decrement),
            5 => Some(Self::SetFromTempVar),
            7 => Some(Self::RoundToInt),
            8 => Some(Self::Substring),
            9 => Some(Self::FindAndReplace),
            21 => Some(Self::Trim),
            22 if case_type == 0 => Some(Self::Lowercase),
            22 if case_type == 1 => Some(Self::Uppercase),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    variable: VariableRef,
    #[serde(skip_serializing_if = "VariableRef::is_empty")]
    variable2: VariableRef,
    action: VariableOperation,
    value: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    find: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    replace: String,
    regex: bool,
    /// First character kept by a substring, counted from 0.
    start: usize,
    /// Characters kept by a substring; 0 keeps the rest.
    length: usize,
    /// Substring pattern; when set, `start` and `length` are unused.
    #[serde(skip_serializing_if = "String::is_empty")]
    pattern: String,
    /// Which match of `pattern` is kept, counted from 0.
    match_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp_var: Option<TempVarRef>,
}

/// Action changing the value of a variable.
///
/// A missing variable is logged and skipped without stopping the action list.
#[derive(Debug, Default)]
pub struct VariableAction {
    settings: Settings,
}

impl VariableAction {
    /// Create an action.
    #[must_use]
    pub fn new(variable: &str, action: VariableOperation) -> Self {
        Self {
            settings: Settings {
                variable: VariableRef::new(variable),
                action,
                ..Settings::default()
            },
        }
    }

    /// Text operand. May contain `${name}`.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.settings.value = value.into();
        self
    }

    /// Second variable for [`VariableOperation::AppendVariable`].
    #[must_use]
    pub fn with_variable2(mut self, variable: &str) -> Self {
        self.settings.variable2 = VariableRef::new(variable);
        self
    }

    /// Search and replacement for [`VariableOperation::FindAndReplace`].
    #[must_use]
    pub fn with_replace(
        mut self,
        find: impl Into<String>,
        replace: impl Into<String>,
        regex: bool,
    ) -> Self {
        self.settings.find = find.into();
        self.settings.replace = replace.into();
        self.settings.regex = regex;
        self
    }

    /// Character range for [`VariableOperation::Substring`]. A `length` of
    /// 0 keeps everything from `start` on.
    #[must_use]
    pub const fn with_range(mut self, start: usize, length: usize) -> Self {
        self.settings.start = start;
        self.settings.length = length;
        self
    }

    /// Pattern for [`VariableOperation::Substring`]; keeps its
    /// `match_index`-th match.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>, match_index: usize) -> Self {
        self.settings.pattern = pattern.into();
        self.settings.match_index = match_index;
        self
    }

    /// Source for [`VariableOperation::SetFromTempVar`].
    #[must_use]
    pub fn with_temp_var(mut self, index: usize, id: &str) -> Self {
        self.settings.temp_var = Some(TempVarRef::new(index, id));
        self
    }

    fn number_operand(&self, variables: &VariableStore) -> Option<f64> {
        let operand = substitute(&self.settings.value, variables);
        let number = parse_number(&operand);
        if number.is_none() {
            warn!(operand = %operand, "variable action operand is not a number");
        }
        number
    }

    fn find_and_replace(&self, current: &str, variables: &VariableStore) -> Option<String> {
        let find = substitute(&self.settings.find, variables);
        let replace = substitute(&self.settings.replace, variables);
        if find.is_empty() {
            return None;
        }
        if !self.settings.regex {
            return Some(current.replace(&find, &replace));
        }
        match Regex::new(&find) {
            Ok(regex) => Some(regex.replace_all(current, replace.as_str()).into_owned()),
            Err(e) => {
                warn!(pattern = %find, "invalid regular expression: {e}");
                None
            }
        }
    }

    fn substring(&self, current: &str, variables: &VariableStore) -> Option<String> {
        let settings = &self.settings;
        if settings.pattern.is_empty() {
            if settings.start >= current.chars().count() {
                warn!(start = settings.start, value = %current, "substring start is past the end");
                return None;
            }
            let rest = current.chars().skip(settings.start);
            return Some(if settings.length == 0 {
                rest.collect()
            } else {
                rest.take(settings.length).collect()
            });
        }

        let pattern = substitute(&settings.pattern, variables);
        match Regex::new(&pattern) {
            Ok(regex) => regex
                .find_iter(current)
                .nth(settings.match_index)
                .map(|found| found.as_str().to_string()),
            Err(e) => {
                warn!(pattern = %pattern, "invalid regular expression: {e}");
                None
            }
        }
    }

    /// New value of the variable, or `None` to leave it unchanged.
    fn next_value(&mut self, current: &str, ctx: &EvalContext<'_>) -> Option<String> {
        let variables = ctx.variables();
        match self.settings.action {
            VariableOperation::Set => Some(substitute(&self.settings.value, variables)),
            VariableOperation::Append => Some(format!(
                "{current}{}",
                substitute(&self.settings.value, variables)
            )),
            VariableOperation::AppendVariable => {
                let other = self.settings.variable2.get(variables).map(Variable::value);
                if other.is_none() {
                    warn!(variable = %self.settings.variable2, "variable not found");
                }
                other.map(|other| format!("{current}{other}"))
            }
            VariableOperation::Increment | VariableOperation::Decrement => {
                let amount = self.number_operand(variables)?;
                let base = if current.trim().is_empty() {
                    0.0
                } else {
                    parse_number(current)?
                };
                let result = if self.settings.action == VariableOperation::Increment {
                    base + amount
                } else {
                    base - amount
                };
                Some(canonical_number(result))
            }
            VariableOperation::SetFromTempVar => {
                let reference = self.settings.temp_var.as_ref()?;
                let value = ctx.read_temp_var(reference).map(str::to_string);
                if value.is_none() {
                    debug!(
                        index = reference.index,
                        temp_var = %reference.id,
                        "temp variable has no value in this pass"
                    );
                }
                value
            }
            VariableOperation::RoundToInt => {
                parse_number(current).map(|n| canonical_number(n.round()))
            }
            VariableOperation::StringLength => Some(current.chars().count().to_string()),
            VariableOperation::Trim => Some(current.trim().to_string()),
            VariableOperation::Lowercase => Some(current.to_lowercase()),
            VariableOperation::Uppercase => Some(current.to_uppercase()),
            VariableOperation::FindAndReplace => self.find_and_replace(current, variables),
            VariableOperation::Substring => self.substring(current, variables),
        }
    }
}

impl Action for VariableAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn perform(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        let Some(current) = self.settings.variable.get(ctx.variables()).map(Variable::value) else {
            warn!(variable = %self.settings.variable, "variable not found");
            return true;
        };
        let Some(next) = self.next_value(&current, ctx) else {
            return true;
        };
        if let Some(variable) = self.settings.variable.get_mut(ctx.variables_mut()) {
            variable.set_value(next);
        }
        true
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
        Ok(())
    }

    fn short_description(&self) -> String {
        let settings = &self.settings;
        match settings.action {
            VariableOperation::Set | VariableOperation::Append => format!(
                "{} {} \"{}\"",
                settings.action.display_name(),
                settings.variable,
                settings.value
            ),
            VariableOperation::Increment | VariableOperation::Decrement => format!(
                "{} {} by {}",
                settings.action.display_name(),
                settings.variable,
                settings.value
            ),
            VariableOperation::AppendVariable => {
                format!("append {} to {}", settings.variable2, settings.variable)
            }
            VariableOperation::SetFromTempVar => match &settings.temp_var {
                Some(reference) => format!(
                    "set {} from condition {} '{}'",
                    settings.variable, reference.index, reference.id
                ),
                None => format!("set {} from temp variable", settings.variable),
            },
            VariableOperation::FindAndReplace => format!(
                "replace \"{}\" with \"{}\" in {}",
                settings.find, settings.replace, settings.variable
            ),
            VariableOperation::Substring if settings.pattern.is_empty() => format!(
                "keep characters {}..{} of {}",
                settings.start,
                if settings.length == 0 {
                    String::new()
                } else {
                    (settings.start + settings.length).to_string()
                },
                settings.variable
            ),
            VariableOperation::Substring => format!(
                "keep match {} of \"{}\" in {}",
                settings.match_index, settings.pattern, settings.variable
            ),
            operation => format!("{} {}", operation.display_name(), settings.variable),
        }
    }

    fn resolve_variables_to_fixed_values(&mut self, variables: &VariableStore) {
        self.settings.value = substitute(&self.settings.value, variables);
        self.settings.find = substitute(&self.settings.find, variables);
        self.settings.replace = substitute(&self.settings.replace, variables);
        self.settings.pattern = substitute(&self.settings.pattern, variables);
    }

    fn temp_var_refs(&self) -> Vec<&TempVarRef> {
        match (&self.settings.temp_var, self.settings.action) {
            (Some(reference), VariableOperation::SetFromTempVar) => vec![reference],
            _ => Vec::new(),
        }
    }

    fn temp_var_refs_mut(&mut self) -> Vec<&mut TempVarRef> {
        match (&mut self.settings.temp_var, self.settings.action) {
            (Some(reference), VariableOperation::SetFromTempVar) => vec![reference],
            _ => Vec::new(),
        }
    }
}

/// Migration v1: snake case keys and a named operation.
///
/// The operation used to be stored in `condition`. Increment and decrement
/// kept their amount in `numValue`. Operations without a counterpart fail to
/// load, so the entry is dropped instead of turning into a different one.
fn settings_v1(data: &mut SegmentData) -> Result<(), AutomacroError> {
    rename_key(data, "variableName", "variable");
    rename_key(data, "variable2Name", "variable2");
    rename_key(data, "strValue", "value");
    rename_key(data, "findStr", "find");
    rename_key(data, "replaceStr", "replace");

    let int = |data: &mut SegmentData, key: &str| data.remove(key).and_then(|v| v.as_i64());
    let code = int(data, "condition").unwrap_or(0);
    let case_type = int(data, "caseType").unwrap_or(0);
    let number = data.remove("numValue").and_then(|v| v.as_f64());
    let segment = data.remove("segmentIdx").and_then(|v| v.as_u64());

    let operation = VariableOperation::from_legacy_code(code, case_type).ok_or_else(|| {
        AutomacroError::Document(format!("variable operation {code} is not supported"))
    })?;

    if matches!(
        operation,
        VariableOperation::Increment | VariableOperation::Decrement
    ) {
        if let Some(number) = number {
            data.insert("value".to_string(), Value::String(canonical_number(number)));
        }
    }
    if operation == VariableOperation::SetFromTempVar {
        let index = segment
            .and_then(|index| usize::try_from(index).ok())
            .unwrap_or(0);
        data.insert(
            "temp_var".to_string(),
            serde_json::to_value(TempVarRef::new(index, "value"))?,
        );
    }

    let enabled = |config: Option<Value>| {
        config
            .as_ref()
            .and_then(|config| config.get("enable"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };
    let find_regex = data.remove("findRegex");
    data.insert("regex".to_string(), Value::from(enabled(find_regex)));
    let pattern_config = data.remove("regexConfig");
    let partial = pattern_config
        .as_ref()
        .and_then(|config| config.get("partial"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let pattern = data.remove("regexPattern");
    if let (true, Some(Value::String(pattern))) = (enabled(pattern_config), pattern) {
        let pattern = if partial {
            pattern
        } else {
            format!(r"\A(?:{pattern})\z")
        };
        data.insert("pattern".to_string(), Value::String(pattern));
    }
    for (from, to) in [
        ("subStringStart", "start"),
        ("subStringSize", "length"),
        ("regexMatchIdx", "match_index"),
    ] {
        if let Some(value) = int(data, from) {
            data.insert(to.to_string(), Value::from(value.max(0)));
        }
    }

    data.insert("action".to_string(), serde_json::to_value(operation)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::conditions::{VariableCheck, VariableCondition};
    use crate::engine::{CancellationController, Document};
    use crate::macros::{LogicType, Macro};
    use serde_json::json;

    fn run(action: VariableAction, variables: &[(&str, &str)]) -> Document {
        let mut document = Document::new();
        for (name, value) in variables {
            document
                .variables_mut()
                .insert(Variable::new(*name).with_value(*value))
                .unwrap();
        }
        document
            .add_macro(Macro::new("m").with_action(Box::new(action)))
            .unwrap();
        document
            .run_actions("m", &CancellationController::new())
            .unwrap();
        document
    }

    fn result(action: VariableAction, start: &str) -> String {
        run(action, &[("v", start)]).variables().value("v").unwrap()
    }

    #[test]
    fn test_text_operations() {
        let set = VariableAction::new("v", VariableOperation::Set).with_value("new");
        assert_eq!(result(set, "old"), "new");

        let append = VariableAction::new("v", VariableOperation::Append).with_value("!");
        assert_eq!(result(append, "hi"), "hi!");

        assert_eq!(
            result(VariableAction::new("v", VariableOperation::Trim), "  x "),
            "x"
        );
        assert_eq!(
            result(VariableAction::new("v", VariableOperation::Uppercase), "abc"),
            "ABC"
        );
        assert_eq!(
            result(VariableAction::new("v", VariableOperation::Lowercase), "AbC"),
            "abc"
        );
        assert_eq!(
            result(VariableAction::new("v", VariableOperation::StringLength), "héllo"),
            "5"
        );
    }

    #[test]
    fn test_set_substitutes_variables() {
        let action = VariableAction::new("v", VariableOperation::Set).with_value("${a}-${b}");
        let document = run(action, &[("v", ""), ("a", "1"), ("b", "2")]);
        assert_eq!(document.variables().value("v").unwrap(), "1-2");
    }

    #[test]
    fn test_append_variable() {
        let action = VariableAction::new("v", VariableOperation::AppendVariable).with_variable2("w");
        let document = run(action, &[("v", "ab"), ("w", "cd")]);
        assert_eq!(document.variables().value("v").unwrap(), "abcd");
    }

    #[test]
    fn test_numeric_operations() {
        let increment = VariableAction::new("v", VariableOperation::Increment).with_value("2.5");
        assert_eq!(result(increment, "1"), "3.5");

        let decrement = VariableAction::new("v", VariableOperation::Decrement).with_value("1");
        assert_eq!(result(decrement, "10"), "9");

        let from_empty = VariableAction::new("v", VariableOperation::Increment).with_value("1");
        assert_eq!(result(from_empty, ""), "1");

        let not_a_number = VariableAction::new("v", VariableOperation::Increment).with_value("1");
        assert_eq!(result(not_a_number, "abc"), "abc");

        assert_eq!(
            result(VariableAction::new("v", VariableOperation::RoundToInt), "2.6"),
            "3"
        );
    }

    #[test]
    fn test_find_and_replace() {
        let plain = VariableAction::new("v", VariableOperation::FindAndReplace)
            .with_replace("a", "o", false);
        assert_eq!(result(plain, "banana"), "bonono");

        let regex = VariableAction::new("v", VariableOperation::FindAndReplace)
            .with_replace(r"\d+", "#", true);
        assert_eq!(result(regex, "a1b22"), "a#b#");

        let invalid = VariableAction::new("v", VariableOperation::FindAndReplace)
            .with_replace("(", "#", true);
        assert_eq!(result(invalid, "(x"), "(x");
    }

    #[test]
    fn test_missing_variable_continues() {
        let runs = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut document = Document::new();
        document
            .add_macro(
                Macro::new("m")
                    .with_action(Box::new(
                        VariableAction::new("missing", VariableOperation::Set).with_value("x"),
                    ))
                    .with_action(crate::engine::testing::CountingAction::boxed(&runs)),
            )
            .unwrap();
        let result = document
            .run_actions("m", &CancellationController::new())
            .unwrap();
        assert!(result.completed);
        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_from_temp_var() {
        let mut document = Document::new();
        for (name, value) in [("source", "42"), ("target", "")] {
            document
                .variables_mut()
                .insert(Variable::new(name).with_value(value))
                .unwrap();
        }
        document
            .add_macro(
                Macro::new("m")
                    .with_condition(
                        LogicType::And,
                        Box::new(VariableCondition::new("source", VariableCheck::IsNumber)),
                    )
                    .with_action(Box::new(
                        VariableAction::new("target", VariableOperation::SetFromTempVar)
                            .with_temp_var(0, "value"),
                    )),
            )
            .unwrap();
        document.tick(
            &CancellationController::new(),
            &crate::engine::EngineConfig::default(),
        );
        assert_eq!(document.variables().value("target").unwrap(), "42");

        let item = document.macros().by_name("m").unwrap();
        assert_eq!(item.condition_reference_count(0), 1);
    }

    #[test]
    fn test_temp_var_refs_only_for_set_from_temp_var() {
        let mut action = VariableAction::new("v", VariableOperation::Set).with_temp_var(0, "value");
        assert!(action.temp_var_refs().is_empty());
        assert!(action.temp_var_refs_mut().is_empty());
    }

    #[test]
    fn test_load_legacy_settings() {
        let data = json!({
            "id": "variable",
            "variableName": "counter",
            "condition": 4,
            "numValue": 2.0,
            "strValue": ""
        });
        let mut action = VariableAction::default();
        action.load(data.as_object().unwrap()).unwrap();
        assert_eq!(action.settings.action, VariableOperation::Decrement);
        assert_eq!(action.settings.value, "2");
        assert_eq!(action.settings.variable.name(), "counter");

        let data = json!({"variableName": "v", "condition": 5, "segmentIdx": 2});
        let mut action = VariableAction::default();
        action.load(data.as_object().unwrap()).unwrap();
        assert_eq!(action.settings.temp_var, Some(TempVarRef::new(2, "value")));

        let data = json!({"variableName": "v", "condition": 22, "caseType": 1});
        let mut action = VariableAction::default();
        action.load(data.as_object().unwrap()).unwrap();
        assert_eq!(action.settings.action, VariableOperation::Uppercase);
    }

    #[test]
    fn test_legacy_substring_keeps_range() {
        let data = json!({
            "variableName": "v",
            "condition": 8,
            "strValue": "ignored",
            "subStringStart": 0,
            "subStringSize": 5
        });
        let mut action = VariableAction::default();
        action.load(data.as_object().unwrap()).unwrap();
        assert_eq!(action.settings.action, VariableOperation::Substring);
        assert_eq!(result(action, "hello world"), "hello");

        let data = json!({
            "variableName": "v",
            "condition": 8,
            "regexConfig": {"enable": true, "partial": true},
            "regexPattern": "[0-9]+",
            "regexMatchIdx": 1
        });
        let mut action = VariableAction::default();
        action.load(data.as_object().unwrap()).unwrap();
        assert_eq!(result(action, "a1 b22 c333"), "22");
    }

    #[test]
    fn test_legacy_operations_without_counterpart_fail_to_load() {
        for code in [6, 10, 14, 23] {
            let data = json!({"variableName": "v", "condition": code, "strValue": "x"});
            let mut action = VariableAction::default();
            assert!(
                matches!(
                    action.load(data.as_object().unwrap()),
                    Err(AutomacroError::Document(_))
                ),
                "code {code}"
            );
        }
    }

    #[test]
    fn test_substring() {
        let range = VariableAction::new("v", VariableOperation::Substring).with_range(6, 0);
        assert_eq!(result(range, "hello world"), "world");

        let counted = VariableAction::new("v", VariableOperation::Substring).with_range(1, 3);
        assert_eq!(result(counted, "héllo"), "éll");

        let past_end = VariableAction::new("v", VariableOperation::Substring).with_range(9, 1);
        assert_eq!(result(past_end, "short"), "short");

        let pattern =
            VariableAction::new("v", VariableOperation::Substring).with_pattern(r"\d+", 0);
        assert_eq!(result(pattern, "ab12cd34"), "12");

        let no_match =
            VariableAction::new("v", VariableOperation::Substring).with_pattern(r"\d+", 5);
        assert_eq!(result(no_match, "ab12"), "ab12");
    }

    #[test]
    fn test_save_load_roundtrip() {
        let action = VariableAction::new("v", VariableOperation::FindAndReplace)
            .with_replace("a", "b", true);
        let mut data = SegmentData::new();
        action.save(&mut data).unwrap();
        assert_eq!(data.get("version"), Some(&json!(1)));
        assert_eq!(data.get("action"), Some(&json!("find_and_replace")));

        let mut loaded = VariableAction::default();
        loaded.load(&data).unwrap();
        assert_eq!(loaded.short_description(), action.short_description());
    }
}
