//! Macros: ordered conditions and actions with run state.
//!
//! This module holds the data model the scheduler drives:
//! - the condition and action plugin contracts
//! - the logic fold and duration modifiers applied to condition results
//! - macro definitions, the ordered macro list and by-name macro references
//! - the registry used to create segments by type id

mod action;
mod condition;
mod definition;
mod duration;
mod list;
pub mod logic;
mod macro_ref;
mod registry;
mod segment;

pub use action::{Action, ActionEntry};
pub use condition::{load_settings, save_settings, Condition, ConditionEntry};
pub use definition::{Macro, MacroPhase, PauseSaveBehavior};
pub use duration::{DurationKind, DurationModifier};
pub use list::{MacroKey, MacroList};
pub use logic::LogicType;
pub use macro_ref::{MacroRef, MultiMacroRef};
pub use registry::{ActionFactory, ConditionFactory, Registry, SegmentType};
pub use segment::{SegmentData, SegmentId, SegmentInfo, SegmentKind};
