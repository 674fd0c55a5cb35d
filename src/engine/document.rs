//! Engine state and the evaluation pass.

use std::time::Instant;

use tracing::{debug, info, trace, warn};

use super::cancel::CancellationController;
use super::context::EvalContext;
use super::{EngineConfig, MacroResult, TickReport};
use crate::error::AutomacroError;
use crate::macros::{logic, ActionEntry, Macro, MacroKey, MacroList, MacroPhase, SegmentKind};
use crate::variables::{TempVarBlackboard, VariableStore};

/// Which action list a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionList {
    Actions,
    ElseActions,
}

/// Macros, variables and temp variables of one document.
///
/// All of it is mutated only through `&mut Document`, which the engine hands
/// out under its single coordination lock.
#[derive(Debug, Default)]
pub struct Document {
    macros: MacroList,
    variables: VariableStore,
    temp_vars: TempVarBlackboard,
    startup_pass: bool,
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from loaded parts and resolve cross references.
    #[must_use]
    pub fn from_parts(macros: MacroList, variables: VariableStore) -> Self {
        let mut document = Self {
            macros,
            variables,
            temp_vars: TempVarBlackboard::new(),
            startup_pass: false,
        };
        document.post_load();
        document
    }

    /// All macros.
    #[must_use]
    pub const fn macros(&self) -> &MacroList {
        &self.macros
    }

    /// All macros for mutation.
    ///
    /// Call [`refresh_temp_vars`](Self::refresh_temp_vars) after changing
    /// condition configuration.
    pub fn macros_mut(&mut self) -> &mut MacroList {
        &mut self.macros
    }

    /// All variables.
    #[must_use]
    pub const fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// All variables for mutation.
    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    /// Temp variables declared and published in the current pass.
    #[must_use]
    pub const fn temp_vars(&self) -> &TempVarBlackboard {
        &self.temp_vars
    }

    /// Add a macro and declare its temp variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or already used.
    pub fn add_macro(&mut self, item: Macro) -> Result<MacroKey, AutomacroError> {
        let key = self.macros.insert(item)?;
        self.declare_temp_vars(key);
        Ok(key)
    }

    /// Remove a macro and everything it declared.
    ///
    /// # Errors
    ///
    /// Returns an error if no macro has this name.
    pub fn remove_macro(&mut self, name: &str) -> Result<Macro, AutomacroError> {
        let removed = self
            .macros
            .remove(name)
            .ok_or_else(|| AutomacroError::NotFound(format!("Macro '{name}'")))?;
        for entry in removed.conditions() {
            self.temp_vars.forget(entry.info.id);
        }
        info!(macro_name = name, "removed macro");
        Ok(removed)
    }

    /// Remove a condition unless an action reads its temp variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the macro or condition does not exist or the
    /// condition is still referenced.
    pub fn remove_condition(&mut self, name: &str, index: usize) -> Result<(), AutomacroError> {
        let item = self
            .macros
            .by_name_mut(name)
            .ok_or_else(|| AutomacroError::NotFound(format!("Macro '{name}'")))?;
        let removed = item.remove_condition(index)?;
        self.temp_vars.forget(removed.info.id);
        Ok(())
    }

    /// Treat the next pass as the first one after startup, where macros
    /// marked `skip_exec_on_start` only check their conditions.
    pub fn mark_startup(&mut self) {
        self.startup_pass = true;
    }

    /// Pause or resume a macro by name.
    ///
    /// # Errors
    ///
    /// Returns an error if no macro has this name.
    pub fn set_paused(&mut self, name: &str, paused: bool) -> Result<(), AutomacroError> {
        let item = self
            .macros
            .by_name_mut(name)
            .ok_or_else(|| AutomacroError::NotFound(format!("Macro '{name}'")))?;
        item.set_paused(paused);
        info!(macro_name = name, paused, "pause state changed");
        Ok(())
    }

    /// Resolve macro references of every segment. Run after the whole
    /// document has been loaded, since references may point forward.
    pub fn post_load(&mut self) {
        for key in self.macros.keys() {
            let Some(item) = self.macros.get_mut(key) else {
                continue;
            };
            let mut conditions = std::mem::take(&mut item.conditions);
            let mut actions = std::mem::take(&mut item.actions);
            let mut else_actions = std::mem::take(&mut item.else_actions);

            for entry in &mut conditions {
                entry.condition.post_load(&self.macros);
            }
            for entry in actions.iter_mut().chain(else_actions.iter_mut()) {
                entry.action.post_load(&self.macros);
            }

            if let Some(item) = self.macros.get_mut(key) {
                item.conditions = conditions;
                item.actions = actions;
                item.else_actions = else_actions;
            }
        }
        self.refresh_temp_vars();
    }

    /// Re-read every condition's temp variable declarations.
    pub fn refresh_temp_vars(&mut self) {
        for key in self.macros.keys() {
            self.declare_temp_vars(key);
        }
    }

    fn declare_temp_vars(&mut self, key: MacroKey) {
        if let Some(item) = self.macros.get(key) {
            for entry in item.conditions() {
                self.temp_vars
                    .declare(entry.info.id, entry.condition.temp_vars());
            }
        }
    }

    /// Freeze `${name}` templates of a macro's segments to current values.
    ///
    /// # Errors
    ///
    /// Returns an error if no macro has this name.
    pub fn resolve_variables_to_fixed_values(&mut self, name: &str) -> Result<(), AutomacroError> {
        let item = self
            .macros
            .by_name_mut(name)
            .ok_or_else(|| AutomacroError::NotFound(format!("Macro '{name}'")))?;
        for entry in &mut item.conditions {
            entry
                .condition
                .resolve_variables_to_fixed_values(&self.variables);
        }
        for entry in item.actions.iter_mut().chain(item.else_actions.iter_mut()) {
            entry
                .action
                .resolve_variables_to_fixed_values(&self.variables);
        }
        Ok(())
    }

    /// Run one evaluation pass over all macros in document order.
    ///
    /// Temp variables are cleared first. Paused macros are skipped without
    /// any check or perform call. The pass stops early once an abort is
    /// pending, leaving the remaining macros for the next pass.
    pub fn tick(&mut self, cancel: &CancellationController, config: &EngineConfig) -> TickReport {
        self.temp_vars.invalidate_all();
        let mut report = TickReport::default();
        let startup = std::mem::take(&mut self.startup_pass);

        for key in self.macros.keys() {
            if cancel.is_aborted() {
                debug!("evaluation pass aborted");
                report.aborted = true;
                break;
            }
            let Some(item) = self.macros.get(key) else {
                continue;
            };
            if item.is_paused() {
                report.macros_paused += 1;
                continue;
            }
            if !item.should_check_conditions(Instant::now()) {
                continue;
            }

            report.macros_evaluated += 1;
            let matched = self.check_conditions(key, cancel, config);
            if matched {
                report.macros_matched += 1;
            }

            let Some(item) = self.macros.get_mut(key) else {
                continue;
            };
            if !item.should_run_actions() {
                item.phase = MacroPhase::Idle;
                continue;
            }
            if startup && item.skip_exec_on_start() {
                info!(macro_name = item.name(), "skipping actions at startup");
                item.phase = MacroPhase::Idle;
                continue;
            }
            let list = if matched {
                ActionList::Actions
            } else {
                ActionList::ElseActions
            };
            if let Some(result) = self.perform_actions(key, list, cancel, false) {
                report.record(result);
            }
        }
        report
    }

    /// Evaluate one macro's conditions and record the result.
    fn check_conditions(
        &mut self,
        key: MacroKey,
        cancel: &CancellationController,
        config: &EngineConfig,
    ) -> bool {
        let Some(item) = self.macros.get_mut(key) else {
            return false;
        };
        item.phase = MacroPhase::Evaluating;
        let macro_name = item.name().to_string();
        let mut entries = std::mem::take(&mut item.conditions);
        let condition_ids = entries.iter().map(|e| e.info.id).collect();

        let mut results = Vec::with_capacity(entries.len());
        {
            let mut ctx = EvalContext::new(
                &mut self.variables,
                &mut self.temp_vars,
                &mut self.macros,
                cancel,
                key,
                condition_ids,
            );
            for (index, entry) in entries.iter_mut().enumerate() {
                if !entry.info.enabled {
                    continue;
                }
                ctx.enter_segment(entry.info.id);
                let started = Instant::now();
                let raw = entry.condition.check(&mut ctx);
                let elapsed = started.elapsed();
                if elapsed >= config.slow_check_warning {
                    warn!(
                        macro_name = %macro_name,
                        condition = entry.condition.id(),
                        index,
                        ?elapsed,
                        "condition check took too long"
                    );
                }
                let value = entry.duration.apply(raw);
                trace!(macro_name = %macro_name, index, raw, value, "condition checked");
                results.push((entry.logic, value));
            }
        }

        // Every check has run; the fold only combines the results.
        let matched = logic::fold(results);

        let Some(item) = self.macros.get_mut(key) else {
            return matched;
        };
        let added = std::mem::replace(&mut item.conditions, entries);
        item.conditions.extend(added);
        item.record_check(matched, Instant::now());
        if item.condition_state_changed() {
            debug!(macro_name = %macro_name, matched, "condition state changed");
        }
        matched
    }

    /// Run one of a macro's action lists in order.
    ///
    /// Stops after an action returns `false`, when the macro gets paused, or
    /// when an abort is pending.
    fn perform_actions(
        &mut self,
        key: MacroKey,
        list: ActionList,
        cancel: &CancellationController,
        ignore_pause: bool,
    ) -> Option<MacroResult> {
        let item = self.macros.get_mut(key)?;
        item.phase = MacroPhase::Executing;
        let macro_name = item.name().to_string();
        let condition_ids = item.conditions.iter().map(|e| e.info.id).collect();
        let mut entries = match list {
            ActionList::Actions => std::mem::take(&mut item.actions),
            ActionList::ElseActions => std::mem::take(&mut item.else_actions),
        };

        let mut performed = 0;
        let mut completed = true;
        {
            let mut ctx = EvalContext::new(
                &mut self.variables,
                &mut self.temp_vars,
                &mut self.macros,
                cancel,
                key,
                condition_ids,
            );
            for (index, entry) in entries.iter_mut().enumerate() {
                if !entry.info.enabled {
                    continue;
                }
                ctx.enter_segment(entry.info.id);
                entry.action.log();
                let ok = entry.action.perform(&mut ctx);
                performed += 1;
                if !ok {
                    debug!(macro_name = %macro_name, index, "action stopped the sequence");
                    completed = false;
                    break;
                }
                let paused = ctx.current_macro().map_or(true, Macro::is_paused);
                if paused && !ignore_pause {
                    debug!(macro_name = %macro_name, "macro paused during actions");
                    completed = false;
                    break;
                }
                if ctx.is_aborted() {
                    debug!(macro_name = %macro_name, "actions aborted");
                    completed = false;
                    break;
                }
            }
        }

        let item = self.macros.get_mut(key)?;
        restore_actions(item, list, entries);
        item.record_run(list == ActionList::Actions);
        Some(MacroResult {
            macro_name,
            matched: list == ActionList::Actions,
            actions_performed: performed,
            completed,
        })
    }

    /// Run a macro's actions now, regardless of its pause flag or conditions.
    ///
    /// # Errors
    ///
    /// Returns an error if no macro has this name.
    pub fn run_actions(
        &mut self,
        name: &str,
        cancel: &CancellationController,
    ) -> Result<MacroResult, AutomacroError> {
        let key = self
            .macros
            .find(name)
            .ok_or_else(|| AutomacroError::NotFound(format!("Macro '{name}'")))?;
        info!(macro_name = name, "running actions manually");
        self.perform_actions(key, ActionList::Actions, cancel, true)
            .ok_or_else(|| AutomacroError::NotFound(format!("Macro '{name}'")))
    }

    /// Number of segments of a macro by kind.
    #[must_use]
    pub fn segment_count(&self, name: &str, kind: SegmentKind) -> Option<usize> {
        let item = self.macros.by_name(name)?;
        Some(match kind {
            SegmentKind::Condition => item.conditions().len(),
            SegmentKind::Action => item.actions().len(),
            SegmentKind::ElseAction => item.else_actions().len(),
        })
    }
}

fn restore_actions(item: &mut Macro, list: ActionList, entries: Vec<ActionEntry>) {
    let slot = match list {
        ActionList::Actions => &mut item.actions,
        ActionList::ElseActions => &mut item.else_actions,
    };
    let added = std::mem::replace(slot, entries);
    slot.extend(added);
}
