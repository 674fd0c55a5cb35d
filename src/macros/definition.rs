//! Macro definitions and their run state.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::action::{Action, ActionEntry};
use super::condition::{Condition, ConditionEntry};
use super::logic::LogicType;
use super::segment::SegmentKind;
use crate::error::AutomacroError;

/// Position of a macro in the evaluation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroPhase {
    /// Between passes.
    #[default]
    Idle,
    /// Conditions are being checked.
    Evaluating,
    /// The fold produced `true`.
    Matched,
    /// The fold produced `false`.
    NotMatched,
    /// Actions are running.
    Executing,
}

impl MacroPhase {
    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Evaluating => "Evaluating",
            Self::Matched => "Matched",
            Self::NotMatched => "Not matched",
            Self::Executing => "Executing",
        }
    }
}

/// How the pause flag is restored on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseSaveBehavior {
    /// Keep the saved flag.
    #[default]
    Persist,
    /// Always load paused.
    Pause,
    /// Always load unpaused.
    Unpause,
}

impl PauseSaveBehavior {
    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Persist => "Persist pause state",
            Self::Pause => "Start paused",
            Self::Unpause => "Start unpaused",
        }
    }

    /// Map a persisted code from documents without a version.
    #[must_use]
    pub const fn from_legacy_code(code: i64) -> Self {
        match code {
            1 => Self::Pause,
            2 => Self::Unpause,
            _ => Self::Persist,
        }
    }

    /// Pause flag to use after loading a saved flag.
    #[must_use]
    pub const fn apply(self, saved: bool) -> bool {
        match self {
            Self::Persist => saved,
            Self::Pause => true,
            Self::Unpause => false,
        }
    }
}

/// A named rule: ordered conditions, ordered actions and run state.
#[derive(Debug)]
pub struct Macro {
    name: String,
    pub(crate) conditions: Vec<ConditionEntry>,
    pub(crate) actions: Vec<ActionEntry>,
    pub(crate) else_actions: Vec<ActionEntry>,
    paused: bool,
    on_change: bool,
    skip_exec_on_start: bool,
    pause_save_behavior: PauseSaveBehavior,
    check_interval: Option<Duration>,
    matched: bool,
    last_matched: bool,
    state_changed: bool,
    run_count: u64,
    pub(crate) phase: MacroPhase,
    last_check: Option<Instant>,
    last_execution: Option<Instant>,
    last_unpause: Option<Instant>,
    last_run: Option<DateTime<Utc>>,
}

impl Macro {
    /// Create an empty macro.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conditions: Vec::new(),
            actions: Vec::new(),
            else_actions: Vec::new(),
            paused: false,
            on_change: false,
            skip_exec_on_start: false,
            pause_save_behavior: PauseSaveBehavior::default(),
            check_interval: None,
            matched: false,
            last_matched: false,
            state_changed: false,
            run_count: 0,
            phase: MacroPhase::Idle,
            last_check: None,
            last_execution: None,
            last_unpause: None,
            last_run: None,
        }
    }

    /// Append a condition with the given logic.
    #[must_use]
    pub fn with_condition(mut self, logic: LogicType, condition: Box<dyn Condition>) -> Self {
        self.conditions
            .push(ConditionEntry::new(condition).with_logic(logic));
        self
    }

    /// Append a prepared condition entry.
    #[must_use]
    pub fn with_condition_entry(mut self, entry: ConditionEntry) -> Self {
        self.conditions.push(entry);
        self
    }

    /// Append an action.
    #[must_use]
    pub fn with_action(mut self, action: Box<dyn Action>) -> Self {
        self.actions.push(ActionEntry::new(action));
        self
    }

    /// Append an else-action.
    #[must_use]
    pub fn with_else_action(mut self, action: Box<dyn Action>) -> Self {
        self.else_actions.push(ActionEntry::new(action));
        self
    }

    /// Run actions only when the match result changes.
    #[must_use]
    pub const fn with_on_change(mut self, on_change: bool) -> Self {
        self.on_change = on_change;
        self
    }

    /// Leave the actions out of the first pass after startup.
    #[must_use]
    pub const fn with_skip_exec_on_start(mut self, skip: bool) -> Self {
        self.skip_exec_on_start = skip;
        self
    }

    /// Start paused.
    #[must_use]
    pub const fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// Check conditions at most this often.
    #[must_use]
    pub const fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    /// Set the pause restore policy.
    #[must_use]
    pub const fn with_pause_save_behavior(mut self, behavior: PauseSaveBehavior) -> Self {
        self.pause_save_behavior = behavior;
        self
    }

    /// Macro name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Condition entries in evaluation order.
    #[must_use]
    pub fn conditions(&self) -> &[ConditionEntry] {
        &self.conditions
    }

    /// Action entries in execution order.
    #[must_use]
    pub fn actions(&self) -> &[ActionEntry] {
        &self.actions
    }

    /// Else-action entries in execution order.
    #[must_use]
    pub fn else_actions(&self) -> &[ActionEntry] {
        &self.else_actions
    }

    /// Mutable condition entries. Structural changes go through the document.
    pub fn conditions_mut(&mut self) -> &mut [ConditionEntry] {
        &mut self.conditions
    }

    /// Mutable action entries.
    pub fn actions_mut(&mut self) -> &mut [ActionEntry] {
        &mut self.actions
    }

    /// Mutable else-action entries.
    pub fn else_actions_mut(&mut self) -> &mut [ActionEntry] {
        &mut self.else_actions
    }

    /// Append an action entry.
    pub fn push_action(&mut self, kind: SegmentKind, entry: ActionEntry) {
        match kind {
            SegmentKind::ElseAction => self.else_actions.push(entry),
            SegmentKind::Action | SegmentKind::Condition => self.actions.push(entry),
        }
    }

    /// Remove an action or else-action.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range.
    pub fn remove_action(
        &mut self,
        kind: SegmentKind,
        index: usize,
    ) -> Result<ActionEntry, AutomacroError> {
        let list = match kind {
            SegmentKind::ElseAction => &mut self.else_actions,
            SegmentKind::Action => &mut self.actions,
            SegmentKind::Condition => {
                return Err(AutomacroError::Segment(
                    "Use remove_condition for conditions".to_string(),
                ))
            }
        };
        if index >= list.len() {
            return Err(AutomacroError::NotFound(format!(
                "{} {index} of macro '{}'",
                kind.display_name(),
                self.name
            )));
        }
        Ok(list.remove(index))
    }

    /// Number of actions reading temp variables of condition `index`.
    #[must_use]
    pub fn condition_reference_count(&self, index: usize) -> usize {
        self.actions
            .iter()
            .chain(&self.else_actions)
            .flat_map(|entry| entry.action.temp_var_refs())
            .filter(|reference| reference.index == index)
            .count()
    }

    /// Remove a condition that no action reads from.
    ///
    /// References to later conditions are shifted down by one.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range or the condition is referenced.
    pub fn remove_condition(&mut self, index: usize) -> Result<ConditionEntry, AutomacroError> {
        if index >= self.conditions.len() {
            return Err(AutomacroError::NotFound(format!(
                "Condition {index} of macro '{}'",
                self.name
            )));
        }
        let references = self.condition_reference_count(index);
        if references > 0 {
            return Err(AutomacroError::Segment(format!(
                "Condition {index} of macro '{}' is read by {references} action(s)",
                self.name
            )));
        }
        for entry in self.actions.iter_mut().chain(self.else_actions.iter_mut()) {
            for reference in entry.action.temp_var_refs_mut() {
                if reference.index > index {
                    reference.index -= 1;
                }
            }
        }
        let removed = self.conditions.remove(index);
        debug!(macro_name = %self.name, index, "removed condition");
        Ok(removed)
    }

    /// Whether the macro is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pause or resume. Resuming records the time and resets duration timers.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused && !paused {
            self.last_unpause = Some(Instant::now());
            for entry in &mut self.conditions {
                entry.duration.reset();
            }
        }
        self.paused = paused;
    }

    /// Whether the macro was resumed after `since`.
    #[must_use]
    pub fn was_paused_since(&self, since: Instant) -> bool {
        self.last_unpause.is_some_and(|at| at > since)
    }

    /// Whether actions ran after `since`.
    #[must_use]
    pub fn was_executed_since(&self, since: Instant) -> bool {
        self.last_execution.is_some_and(|at| at > since)
    }

    /// Result of the most recent evaluation.
    #[must_use]
    pub const fn matched(&self) -> bool {
        self.matched
    }

    /// Whether the most recent evaluation changed the result.
    #[must_use]
    pub const fn condition_state_changed(&self) -> bool {
        self.state_changed
    }

    /// Number of action runs.
    #[must_use]
    pub const fn run_count(&self) -> u64 {
        self.run_count
    }

    /// Reset the run counter.
    pub fn reset_run_count(&mut self) {
        self.run_count = 0;
    }

    /// Current state machine position.
    #[must_use]
    pub const fn phase(&self) -> MacroPhase {
        self.phase
    }

    /// Whether actions run only on result changes.
    #[must_use]
    pub const fn on_change(&self) -> bool {
        self.on_change
    }

    /// Set edge-triggered execution.
    pub fn set_on_change(&mut self, on_change: bool) {
        self.on_change = on_change;
    }

    /// Whether the first pass after startup leaves the actions out.
    #[must_use]
    pub const fn skip_exec_on_start(&self) -> bool {
        self.skip_exec_on_start
    }

    /// Pause restore policy.
    #[must_use]
    pub const fn pause_save_behavior(&self) -> PauseSaveBehavior {
        self.pause_save_behavior
    }

    /// Set the pause restore policy.
    pub fn set_pause_save_behavior(&mut self, behavior: PauseSaveBehavior) {
        self.pause_save_behavior = behavior;
    }

    /// Custom check interval.
    #[must_use]
    pub const fn check_interval(&self) -> Option<Duration> {
        self.check_interval
    }

    /// Set or clear the custom check interval.
    pub fn set_check_interval(&mut self, interval: Option<Duration>) {
        self.check_interval = interval;
    }

    /// Wall-clock time of the last action run.
    #[must_use]
    pub const fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    /// Time of the last evaluation.
    #[must_use]
    pub const fn last_check(&self) -> Option<Instant> {
        self.last_check
    }

    /// Whether the custom check interval allows an evaluation at `now`.
    #[must_use]
    pub fn should_check_conditions(&self, now: Instant) -> bool {
        match (self.check_interval, self.last_check) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    /// Whether the last evaluation calls for an action run.
    #[must_use]
    pub fn should_run_actions(&self) -> bool {
        let has_work = self.matched || !self.else_actions.is_empty();
        !self.paused && has_work && (!self.on_change || self.state_changed)
    }

    pub(crate) fn record_check(&mut self, matched: bool, now: Instant) {
        self.state_changed = self.last_matched != matched;
        self.last_matched = matched;
        self.matched = matched;
        self.last_check = Some(now);
        self.phase = if matched {
            MacroPhase::Matched
        } else {
            MacroPhase::NotMatched
        };
    }

    pub(crate) fn record_run(&mut self, counted: bool) {
        if counted {
            self.run_count = self.run_count.saturating_add(1);
        }
        self.last_execution = Some(Instant::now());
        self.last_run = Some(Utc::now());
        self.phase = MacroPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_macro_defaults() {
        let item = Macro::new("m");
        assert!(!item.is_paused());
        assert!(!item.matched());
        assert_eq!(item.run_count(), 0);
        assert_eq!(item.phase(), MacroPhase::Idle);
        assert!(!item.should_run_actions());
    }

    #[test]
    fn test_level_triggered_by_default() {
        let mut item = Macro::new("m");
        let now = Instant::now();
        item.record_check(true, now);
        assert!(item.should_run_actions());
        item.record_check(true, now);
        assert!(item.should_run_actions());
    }

    #[test]
    fn test_on_change_is_edge_triggered() {
        let mut item = Macro::new("m").with_on_change(true);
        let now = Instant::now();
        item.record_check(true, now);
        assert!(item.should_run_actions());
        item.record_check(true, now);
        assert!(!item.should_run_actions());
        item.record_check(false, now);
        assert!(!item.should_run_actions());
        item.record_check(true, now);
        assert!(item.should_run_actions());
    }

    #[test]
    fn test_paused_never_runs() {
        let mut item = Macro::new("m");
        item.record_check(true, Instant::now());
        item.set_paused(true);
        assert!(!item.should_run_actions());
    }

    #[test]
    fn test_unpause_records_time() {
        let before = Instant::now();
        let mut item = Macro::new("m").with_paused(true);
        assert!(!item.was_paused_since(before));
        item.set_paused(false);
        assert!(item.was_paused_since(before));
    }

    #[test]
    fn test_check_interval() {
        let now = Instant::now();
        let mut item = Macro::new("m").with_check_interval(Duration::from_secs(5));
        assert!(item.should_check_conditions(now));
        item.record_check(false, now);
        assert!(!item.should_check_conditions(now + Duration::from_secs(1)));
        assert!(item.should_check_conditions(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_record_run_counts() {
        let mut item = Macro::new("m");
        item.record_run(true);
        item.record_run(false);
        assert_eq!(item.run_count(), 1);
        assert!(item.last_run().is_some());
        item.reset_run_count();
        assert_eq!(item.run_count(), 0);
    }

    #[test]
    fn test_pause_save_behavior() {
        assert!(PauseSaveBehavior::Persist.apply(true));
        assert!(!PauseSaveBehavior::Persist.apply(false));
        assert!(PauseSaveBehavior::Pause.apply(false));
        assert!(!PauseSaveBehavior::Unpause.apply(true));
        assert_eq!(
            PauseSaveBehavior::from_legacy_code(2),
            PauseSaveBehavior::Unpause
        );
    }
}
