//! Output formatting for automacro.
//!
//! Macros and variables are first flattened into serializable views, which
//! both the JSON and the pretty formatter render.

mod json;
mod pretty;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::engine::{Document, TickReport};
use crate::error::AutomacroError;
use crate::macros::{
    ActionEntry, DurationKind, LogicType, Macro, MacroPhase, PauseSaveBehavior,
};
use crate::variables::{SaveAction, Variable};

pub use json::*;
pub use pretty::*;

/// One condition or action of a macro.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentView {
    /// Segment type id.
    pub id: String,
    /// One-line summary.
    pub description: String,
    /// Whether the segment takes part in evaluation.
    pub enabled: bool,
    /// Logic operator, for conditions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logic: Option<LogicType>,
    /// Duration modifier, for conditions that have one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl SegmentView {
    fn action(entry: &ActionEntry) -> Self {
        Self {
            id: entry.action.id().to_string(),
            description: entry.action.short_description(),
            enabled: entry.info.enabled,
            logic: None,
            duration: None,
        }
    }
}

/// A macro and its run state.
#[derive(Debug, Clone, Serialize)]
pub struct MacroView {
    /// Macro name.
    pub name: String,
    /// Pause flag.
    pub paused: bool,
    /// Result of the last evaluation.
    pub matched: bool,
    /// Number of matched action runs.
    pub run_count: u64,
    /// State machine position.
    pub phase: MacroPhase,
    /// Edge-triggered execution.
    pub on_change: bool,
    /// How the pause flag is restored.
    pub pause_save_behavior: PauseSaveBehavior,
    /// Per-macro check interval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval_ms: Option<u128>,
    /// Last action run.
    pub last_run: Option<DateTime<Utc>>,
    /// Conditions in order.
    pub conditions: Vec<SegmentView>,
    /// Actions in order.
    pub actions: Vec<SegmentView>,
    /// Else-actions in order.
    pub else_actions: Vec<SegmentView>,
}

impl From<&Macro> for MacroView {
    fn from(item: &Macro) -> Self {
        let conditions = item
            .conditions()
            .iter()
            .map(|entry| SegmentView {
                id: entry.condition.id().to_string(),
                description: entry.condition.short_description(),
                enabled: entry.info.enabled,
                logic: Some(entry.logic),
                duration: (entry.duration.kind != DurationKind::None).then(|| {
                    format!(
                        "{} {}s",
                        entry.duration.kind.display_name(),
                        entry.duration.seconds
                    )
                }),
            })
            .collect();

        Self {
            name: item.name().to_string(),
            paused: item.is_paused(),
            matched: item.matched(),
            run_count: item.run_count(),
            phase: item.phase(),
            on_change: item.on_change(),
            pause_save_behavior: item.pause_save_behavior(),
            check_interval_ms: item.check_interval().map(|d| d.as_millis()),
            last_run: item.last_run(),
            conditions,
            actions: item.actions().iter().map(SegmentView::action).collect(),
            else_actions: item.else_actions().iter().map(SegmentView::action).collect(),
        }
    }
}

/// A variable and its save policy.
#[derive(Debug, Clone, Serialize)]
pub struct VariableView {
    /// Variable name.
    pub name: String,
    /// Current value.
    pub value: String,
    /// Value restored by [`SaveAction::SetDefault`].
    pub default_value: String,
    /// Save policy.
    pub save_action: SaveAction,
    /// Number of value changes since load.
    pub change_count: u64,
}

impl From<&Variable> for VariableView {
    fn from(variable: &Variable) -> Self {
        Self {
            name: variable.name().to_string(),
            value: variable.peek().to_string(),
            default_value: variable.default_value().to_string(),
            save_action: variable.save_action(),
            change_count: variable.change_count(),
        }
    }
}

/// Views of all macros in document order.
#[must_use]
pub fn macro_views(document: &Document) -> Vec<MacroView> {
    document
        .macros()
        .iter()
        .map(|(_, item)| MacroView::from(item))
        .collect()
}

/// Views of all variables in name order.
#[must_use]
pub fn variable_views(document: &Document) -> Vec<VariableView> {
    document
        .variables()
        .iter()
        .into_iter()
        .map(VariableView::from)
        .collect()
}

/// Format macros based on output format
///
/// # Errors
///
/// Returns `AutomacroError::Json` if JSON serialization fails.
pub fn format_macros(macros: &[MacroView], format: OutputFormat) -> Result<String, AutomacroError> {
    match format {
        OutputFormat::Pretty => Ok(format_macros_pretty(macros)),
        OutputFormat::Json => format_macros_json(macros),
    }
}

/// Format a single macro based on output format
///
/// # Errors
///
/// Returns `AutomacroError::Json` if JSON serialization fails.
pub fn format_macro(item: &MacroView, format: OutputFormat) -> Result<String, AutomacroError> {
    match format {
        OutputFormat::Pretty => Ok(format_macro_pretty(item)),
        OutputFormat::Json => to_json(item),
    }
}

/// Format variables based on output format
///
/// # Errors
///
/// Returns `AutomacroError::Json` if JSON serialization fails.
pub fn format_variables(
    variables: &[VariableView],
    format: OutputFormat,
) -> Result<String, AutomacroError> {
    match format {
        OutputFormat::Pretty => Ok(format_variables_pretty(variables)),
        OutputFormat::Json => format_variables_json(variables),
    }
}

/// Format an evaluation report based on output format
///
/// # Errors
///
/// Returns `AutomacroError::Json` if JSON serialization fails.
pub fn format_tick_report(
    report: &TickReport,
    passes: u64,
    format: OutputFormat,
) -> Result<String, AutomacroError> {
    match format {
        OutputFormat::Pretty => Ok(format_tick_report_pretty(report, passes)),
        OutputFormat::Json => format_tick_report_json(report, passes),
    }
}
