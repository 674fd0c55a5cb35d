//! Inspect the state of other macros.

use serde::{Deserialize, Serialize};

use crate::engine::EvalContext;
use crate::error::AutomacroError;
use crate::macros::{
    load_settings, save_settings, Condition, MacroList, MacroRef, MultiMacroRef, SegmentData,
};
use crate::variables::TempVarDecl;

pub(super) const ID: &str = "macro";

/// What is inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroCheck {
    /// Compare the run count with `count`.
    #[default]
    Count,
    /// The macro's conditions matched at its last evaluation.
    State,
    /// Compare how many of `macros` matched with `count`.
    MultiState,
    /// The action at `action_index` is disabled.
    ActionDisabled,
    /// The action at `action_index` is enabled.
    ActionEnabled,
    /// The macro is paused.
    Paused,
    /// The macro ran actions after its last evaluation.
    ActionsPerformed,
}

impl MacroCheck {
    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Count => "run count",
            Self::State => "matched",
            Self::MultiState => "matched count",
            Self::ActionDisabled => "action disabled",
            Self::ActionEnabled => "action enabled",
            Self::Paused => "paused",
            Self::ActionsPerformed => "actions performed",
        }
    }
}

/// Numeric comparison against the configured count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Strictly less.
    #[default]
    Below,
    /// Equal.
    Equal,
    /// Strictly greater.
    Above,
}

impl Comparison {
    /// Evaluate the comparison.
    #[must_use]
    pub const fn evaluate(self, actual: u64, expected: u64) -> bool {
        match self {
            Self::Below => actual < expected,
            Self::Equal => actual == expected,
            Self::Above => actual > expected,
        }
    }

    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Below => "<",
            Self::Equal => "=",
            Self::Above => ">",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    #[serde(rename = "macro")]
    target: MacroRef,
    #[serde(skip_serializing_if = "MultiMacroRef::is_empty")]
    macros: MultiMacroRef,
    check: MacroCheck,
    comparison: Comparison,
    count: u64,
    action_index: usize,
}

/// Condition on another macro's run state.
///
/// The inspected state is whatever the target recorded most recently, which
/// for macros later in the document is the previous pass.
#[derive(Debug, Default)]
pub struct MacroCondition {
    settings: Settings,
}

impl MacroCondition {
    /// Inspect a single macro.
    #[must_use]
    pub fn new(target: &str, check: MacroCheck) -> Self {
        Self {
            settings: Settings {
                target: MacroRef::new(target),
                check,
                ..Settings::default()
            },
        }
    }

    /// Count how many of several macros matched.
    #[must_use]
    pub fn matched_count(targets: &[&str], comparison: Comparison, count: u64) -> Self {
        Self {
            settings: Settings {
                macros: MultiMacroRef(targets.iter().map(|name| MacroRef::new(*name)).collect()),
                check: MacroCheck::MultiState,
                comparison,
                count,
                ..Settings::default()
            },
        }
    }

    /// Comparison and count for [`MacroCheck::Count`].
    #[must_use]
    pub const fn with_count(mut self, comparison: Comparison, count: u64) -> Self {
        self.settings.comparison = comparison;
        self.settings.count = count;
        self
    }

    /// Action index for the action state checks.
    #[must_use]
    pub const fn with_action_index(mut self, index: usize) -> Self {
        self.settings.action_index = index;
        self
    }

    fn check_target(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        let check = self.settings.check;
        let Some(target) = self.settings.target.get(ctx.macros()) else {
            return false;
        };
        match check {
            MacroCheck::Count => {
                let run_count = target.run_count();
                let result = self.settings.comparison.evaluate(run_count, self.settings.count);
                ctx.publish_temp_var("run_count", run_count.to_string());
                result
            }
            MacroCheck::State => target.matched(),
            MacroCheck::ActionDisabled => target
                .actions()
                .get(self.settings.action_index)
                .is_some_and(|entry| !entry.info.enabled),
            MacroCheck::ActionEnabled => target
                .actions()
                .get(self.settings.action_index)
                .is_some_and(|entry| entry.info.enabled),
            MacroCheck::Paused => target.is_paused(),
            MacroCheck::ActionsPerformed => target
                .last_check()
                .is_some_and(|checked| target.was_executed_since(checked)),
            MacroCheck::MultiState => false,
        }
    }

    fn check_multi_state(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        let macros = ctx.macros();
        let matched = self
            .settings
            .macros
            .resolve_all(macros)
            .into_iter()
            .filter_map(|key| macros.get(key))
            .filter(|item| item.matched())
            .count() as u64;
        ctx.publish_temp_var("matched_count", matched.to_string());
        self.settings.comparison.evaluate(matched, self.settings.count)
    }
}

impl Condition for MacroCondition {
    fn id(&self) -> &'static str {
        ID
    }

    fn check(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        if self.settings.check == MacroCheck::MultiState {
            self.check_multi_state(ctx)
        } else {
            self.check_target(ctx)
        }
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
        match settings.check {
            MacroCheck::Count => format!(
                "{} run count {} {}",
                settings.target,
                settings.comparison.display_name(),
                settings.count
            ),
            MacroCheck::MultiState => format!(
                "matched of [{}] {} {}",
                settings.macros,
                settings.comparison.display_name(),
                settings.count
            ),
            MacroCheck::ActionDisabled | MacroCheck::ActionEnabled => format!(
                "{} {} #{}",
                settings.target,
                settings.check.display_name(),
                settings.action_index
            ),
            check => format!("{} {}", settings.target, check.display_name()),
        }
    }

    fn temp_vars(&self) -> Vec<TempVarDecl> {
        match self.settings.check {
            MacroCheck::Count => vec![TempVarDecl::new("run_count", "Run count")],
            MacroCheck::MultiState => vec![TempVarDecl::new("matched_count", "Matched count")
                .with_description("Number of listed macros whose conditions matched")],
            _ => Vec::new(),
        }
    }

    fn post_load(&mut self, macros: &MacroList) {
        self.settings.target.post_load(macros);
        self.settings.macros.post_load(macros);
    }
}
