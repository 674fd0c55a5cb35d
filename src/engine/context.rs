//! The view of the document a condition or action works through.

use std::time::{Duration, Instant};

use super::cancel::{CancellationController, WaitOutcome};
use crate::macros::{Macro, MacroKey, MacroList, SegmentId};
use crate::variables::{TempVarBlackboard, TempVarRef, VariableStore};

/// Borrowed engine state handed to `check` and `perform`.
///
/// The owning macro stays in the list while its segments run, but the list
/// being evaluated is temporarily detached from it.
pub struct EvalContext<'a> {
    variables: &'a mut VariableStore,
    temp_vars: &'a mut TempVarBlackboard,
    macros: &'a mut MacroList,
    cancel: &'a CancellationController,
    current: MacroKey,
    segment: Option<SegmentId>,
    condition_ids: Vec<SegmentId>,
}

impl<'a> EvalContext<'a> {
    pub(crate) fn new(
        variables: &'a mut VariableStore,
        temp_vars: &'a mut TempVarBlackboard,
        macros: &'a mut MacroList,
        cancel: &'a CancellationController,
        current: MacroKey,
        condition_ids: Vec<SegmentId>,
    ) -> Self {
        Self {
            variables,
            temp_vars,
            macros,
            cancel,
            current,
            segment: None,
            condition_ids,
        }
    }

    pub(crate) fn enter_segment(&mut self, segment: SegmentId) {
        self.segment = Some(segment);
    }

    /// The document's variables.
    #[must_use]
    pub fn variables(&self) -> &VariableStore {
        &*self.variables
    }

    /// The document's variables for mutation.
    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut *self.variables
    }

    /// All macros of the document.
    #[must_use]
    pub fn macros(&self) -> &MacroList {
        &*self.macros
    }

    /// All macros of the document for mutation.
    pub fn macros_mut(&mut self) -> &mut MacroList {
        &mut *self.macros
    }

    /// Handle of the macro being evaluated.
    #[must_use]
    pub const fn current_macro_key(&self) -> MacroKey {
        self.current
    }

    /// The macro being evaluated.
    #[must_use]
    pub fn current_macro(&self) -> Option<&Macro> {
        self.macros.get(self.current)
    }

    /// Segment currently running.
    #[must_use]
    pub const fn current_segment(&self) -> Option<SegmentId> {
        self.segment
    }

    /// Publish a temp variable of the running segment for the rest of the pass.
    pub fn publish_temp_var(&mut self, id: &str, value: impl Into<String>) -> bool {
        let Some(segment) = self.segment else {
            return false;
        };
        self.temp_vars.publish(segment, id, value.into())
    }

    /// Read a temp variable of a condition of the current macro.
    ///
    /// Absent until that condition has published it in the current pass.
    #[must_use]
    pub fn read_temp_var(&self, reference: &TempVarRef) -> Option<&str> {
        let segment = self.condition_ids.get(reference.index)?;
        self.temp_vars.read(*segment, &reference.id)
    }

    /// Read a temp variable of any segment.
    #[must_use]
    pub fn read_segment_temp_var(&self, segment: SegmentId, id: &str) -> Option<&str> {
        self.temp_vars.read(segment, id)
    }

    /// The shared cancellation controller.
    #[must_use]
    pub const fn cancel(&self) -> &CancellationController {
        self.cancel
    }

    /// Whether the running action should stop.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.cancel.is_aborted()
    }

    /// Bounded, interruptible wait.
    pub fn wait(&self, duration: Duration) -> WaitOutcome {
        self.cancel.wait_for(duration)
    }

    /// Bounded, interruptible wait until a deadline.
    pub fn wait_until(&self, deadline: Instant) -> WaitOutcome {
        self.cancel.wait_until(deadline)
    }
}
