//! JSON output formatting for automacro.

use serde::Serialize;
use serde_json::json;

use super::{MacroView, VariableView};
use crate::engine::TickReport;
use crate::error::AutomacroError;

/// Format macros as JSON
///
/// # Errors
///
/// Returns `AutomacroError::Json` if JSON serialization fails.
pub fn format_macros_json(macros: &[MacroView]) -> Result<String, AutomacroError> {
    let output = json!({
        "count": macros.len(),
        "items": macros
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format variables as JSON
///
/// # Errors
///
/// Returns `AutomacroError::Json` if JSON serialization fails.
pub fn format_variables_json(variables: &[VariableView]) -> Result<String, AutomacroError> {
    let output = json!({
        "count": variables.len(),
        "items": variables
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format an evaluation report as JSON
///
/// # Errors
///
/// Returns `AutomacroError::Json` if JSON serialization fails.
pub fn format_tick_report_json(report: &TickReport, passes: u64) -> Result<String, AutomacroError> {
    let output = json!({
        "passes": passes,
        "report": report
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Generic JSON formatter for any serializable type
///
/// # Errors
///
/// Returns `AutomacroError::Json` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, AutomacroError> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MacroResult;

    #[test]
    fn test_tick_report_json() {
        let report = TickReport {
            macros_evaluated: 2,
            macros_matched: 1,
            actions_performed: 3,
            runs: vec![MacroResult {
                macro_name: "m".to_string(),
                matched: true,
                actions_performed: 3,
                completed: true,
            }],
            ..TickReport::default()
        };
        let output = format_tick_report_json(&report, 4).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["passes"], 4);
        assert_eq!(value["report"]["macros_matched"], 1);
        assert_eq!(value["report"]["runs"][0]["macro_name"], "m");
    }

    #[test]
    fn test_variables_json() {
        let variables = vec![VariableView {
            name: "a".to_string(),
            value: "1".to_string(),
            default_value: String::new(),
            save_action: crate::variables::SaveAction::Save,
            change_count: 0,
        }];
        let output = format_variables_json(&variables).unwrap();
        assert!(output.contains("\"count\": 1"));
        assert!(output.contains("\"save_action\": \"save\""));
    }
}
