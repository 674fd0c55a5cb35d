//! Built-in conditions.

mod macro_state;
mod temp_var;
mod variable;

pub use macro_state::{Comparison, MacroCheck, MacroCondition};
pub use temp_var::{TempVarCheck, TempVarCondition};
pub use variable::{VariableCheck, VariableCondition};

use crate::macros::Registry;

pub(super) fn register(registry: &mut Registry) {
    registry.register_condition(variable::ID, "Variable", || {
        Box::new(VariableCondition::default())
    });
    registry.register_condition(macro_state::ID, "Macro", || {
        Box::new(MacroCondition::default())
    });
    registry.register_condition(temp_var::ID, "Temp variable", || {
        Box::new(TempVarCondition::default())
    });
}
