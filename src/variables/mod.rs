//! Named variables and per-pass temp variables.
//!
//! Variables are the only state shared between macros that survives save and
//! load. Temp variables carry values from a condition to the rest of the same
//! evaluation pass.

mod store;
mod substitute;
mod temp;

pub use store::{
    canonical_number, parse_number, SaveAction, SavedVariable, Variable, VariableKey,
    VariableRef, VariableStore, VariableValue,
};
pub use substitute::{referenced_names, substitute};
pub use temp::{TempVarBlackboard, TempVarDecl, TempVarRef};
