//! The action plugin contract.

use std::fmt;

use tracing::info;

use super::list::MacroList;
use super::segment::{SegmentData, SegmentInfo};
use crate::engine::EvalContext;
use crate::error::AutomacroError;
use crate::variables::{TempVarRef, VariableStore};

/// A pluggable effect run when its macro matches.
///
/// Actions run strictly in list order on the scheduler thread. Any bounded
/// wait goes through [`EvalContext::wait`] so that edits and shutdown can
/// interrupt it. Returning `false` stops the rest of the action list.
pub trait Action: Send {
    /// Stable type identifier, persisted as the entry's `id`.
    fn id(&self) -> &'static str;

    /// Run the action. `false` stops the remaining actions of this run.
    fn perform(&mut self, ctx: &mut EvalContext<'_>) -> bool;

    /// Report the action about to be performed.
    fn log(&self) {
        info!(action = self.id(), "performing {}", self.short_description());
    }

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

    /// Re-resolve macro references once the whole document is loaded.
    fn post_load(&mut self, _macros: &MacroList) {}

    /// Replace `${name}` templates with the variables' current values.
    fn resolve_variables_to_fixed_values(&mut self, _variables: &VariableStore) {}

    /// Temp variables of the owning macro's conditions that this action reads.
    fn temp_var_refs(&self) -> Vec<&TempVarRef> {
        Vec::new()
    }

    /// Mutable access to the temp variable references, for re-indexing.
    fn temp_var_refs_mut(&mut self) -> Vec<&mut TempVarRef> {
        Vec::new()
    }
}

/// An action together with its shared segment flags.
pub struct ActionEntry {
    /// Shared segment flags.
    pub info: SegmentInfo,
    /// The action itself.
    pub action: Box<dyn Action>,
}

impl ActionEntry {
    /// Wrap an action with default settings.
    #[must_use]
    pub fn new(action: Box<dyn Action>) -> Self {
        Self {
            info: SegmentInfo::new(),
            action,
        }
    }

    /// Disable the entry.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.info.enabled = false;
        self
    }
}

impl fmt::Debug for ActionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionEntry")
            .field("id", &self.action.id())
            .field("segment", &self.info.id)
            .field("enabled", &self.info.enabled)
            .finish()
    }
}
