//! Control another macro.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::EvalContext;
use crate::error::AutomacroError;
use crate::macros::{load_settings, save_settings, Action, MacroList, MacroRef, SegmentData};

pub(super) const ID: &str = "macro";

/// Change applied to the target macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroOperation {
    /// Pause the target.
    #[default]
    Pause,
    /// Unpause the target.
    Unpause,
    /// Flip the target's pause flag.
    TogglePause,
    /// Reset the target's run count to zero.
    ResetCounter,
}

impl MacroOperation {
    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Unpause => "unpause",
            Self::TogglePause => "toggle pause of",
            Self::ResetCounter => "reset run count of",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    #[serde(rename = "macro")]
    target: MacroRef,
    action: MacroOperation,
}

/// Action pausing, unpausing or resetting a macro by name.
///
/// The target may be the owning macro. A missing target is logged and
/// skipped.
#[derive(Debug, Default)]
pub struct MacroAction {
    settings: Settings,
}

impl MacroAction {
    /// Create an action on `target`.
    #[must_use]
    pub fn new(target: &str, action: MacroOperation) -> Self {
        Self {
            settings: Settings {
                target: MacroRef::new(target),
                action,
            },
        }
    }
}

impl Action for MacroAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn perform(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        let operation = self.settings.action;
        let Some(target) = self.settings.target.get_mut(ctx.macros_mut()) else {
            warn!(target = %self.settings.target, "macro not found");
            return true;
        };
        match operation {
            MacroOperation::Pause => target.set_paused(true),
            MacroOperation::Unpause => target.set_paused(false),
            MacroOperation::TogglePause => {
                let paused = target.is_paused();
                target.set_paused(!paused);
            }
            MacroOperation::ResetCounter => target.reset_run_count(),
        }
        true
    }

    fn save(&self, data: &mut SegmentData) -> Result<(), AutomacroError> {
        save_settings(&self.settings, data)
    }

    fn load(&mut self, data: &SegmentData) -> Result<(), AutomacroError> {
        self.settings = load_settings(data)?;
        Ok(())
    }

    fn short_description(&self) -> String {
        format!(
            "{} {}",
            self.settings.action.display_name(),
            self.settings.target
        )
    }

    fn post_load(&mut self, macros: &MacroList) {
        self.settings.target.post_load(macros);
    }
}
