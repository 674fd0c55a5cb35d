//! Built-in actions.

mod log;
mod macro_control;
mod run;
mod variable;
mod wait;

pub use log::{LogAction, LogLevel};
pub use macro_control::{MacroAction, MacroOperation};
pub use run::RunAction;
pub use variable::{VariableAction, VariableOperation};
pub use wait::{WaitAction, WaitType};

use crate::macros::Registry;

pub(super) fn register(registry: &mut Registry) {
    registry.register_action(variable::ID, "Variable", || {
        Box::new(VariableAction::default())
    });
    registry.register_action(wait::ID, "Wait", || Box::new(WaitAction::default()));
    registry.register_action(log::ID, "Log", || Box::new(LogAction::default()));
    registry.register_action(macro_control::ID, "Macro", || {
        Box::new(MacroAction::default())
    });
    registry.register_action(run::ID, "Run", || Box::new(RunAction::default()));
}
