//! Write a message to the log.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::EvalContext;
use crate::error::AutomacroError;
use crate::macros::{load_settings, save_settings, Action, SegmentData};
use crate::variables::{substitute, VariableStore};

pub(super) const ID: &str = "log";

/// Level the message is logged at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Debug output.
    Debug,
    /// Informational output.
    #[default]
    Info,
    /// Warning.
    Warn,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    message: String,
    level: LogLevel,
}

/// Action logging a message with `${name}` templates resolved.
#[derive(Debug, Default)]
pub struct LogAction {
    settings: Settings,
}

impl LogAction {
    /// Log `message` at info level.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            settings: Settings {
                message: message.into(),
                level: LogLevel::Info,
            },
        }
    }

    /// Change the level.
    #[must_use]
    pub const fn with_level(mut self, level: LogLevel) -> Self {
        self.settings.level = level;
        self
    }

    /// The message as it would be logged now.
    #[must_use]
    pub fn render(&self, variables: &VariableStore) -> String {
        substitute(&self.settings.message, variables)
    }
}

impl Action for LogAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn perform(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        let message = self.render(ctx.variables());
        let macro_name = ctx.current_macro().map(|m| m.name().to_string());
        let macro_name = macro_name.as_deref().unwrap_or_default();
        match self.settings.level {
            LogLevel::Debug => debug!(macro_name, "{message}"),
            LogLevel::Info => info!(macro_name, "{message}"),
            LogLevel::Warn => warn!(macro_name, "{message}"),
        }
        true
    }

    // The message itself is the log line.
    fn log(&self) {}

    fn save(&self, data: &mut SegmentData) -> Result<(), AutomacroError> {
        save_settings(&self.settings, data)
    }

    fn load(&mut self, data: &SegmentData) -> Result<(), AutomacroError> {
        self.settings = load_settings(data)?;
        Ok(())
    }

    fn short_description(&self) -> String {
        format!("log \"{}\"", self.settings.message)
    }

    fn resolve_variables_to_fixed_values(&mut self, variables: &VariableStore) {
        self.settings.message = self.render(variables);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CancellationController, Document};
    use crate::macros::Macro;
    use crate::variables::Variable;

    fn variables() -> VariableStore {
        let mut variables = VariableStore::new();
        variables
            .insert(Variable::new("name").with_value("world"))
            .unwrap();
        variables
    }

    #[test]
    fn test_render_substitutes() {
        let action = LogAction::new("hello ${name}");
        assert_eq!(action.render(&variables()), "hello world");
    }

    #[test]
    fn test_resolve_fixes_message() {
        let mut action = LogAction::new("hello ${name}");
        action.resolve_variables_to_fixed_values(&variables());
        assert_eq!(action.short_description(), "log \"hello world\"");
    }

    #[test]
    fn test_perform_continues() {
        let mut document = Document::new();
        document
            .add_macro(
                Macro::new("m").with_action(Box::new(
                    LogAction::new("done").with_level(LogLevel::Warn),
                )),
            )
            .unwrap();
        let result = document
            .run_actions("m", &CancellationController::new())
            .unwrap();
        assert!(result.completed);
        assert_eq!(result.actions_performed, 1);
    }
}
