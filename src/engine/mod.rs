//! Macro scheduling and evaluation.
//!
//! A [`Document`] holds all mutable engine state. The [`Engine`] owns it
//! behind one coordination lock and drives it from a dedicated scheduler
//! thread; editors reach it through [`Engine::edit`], which interrupts any
//! in-flight wait before taking the lock.

mod cancel;
mod context;
mod document;
mod scheduler;
#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use serde::Serialize;

pub use cancel::{AbortGuard, CancellationController, WaitOutcome};
pub use context::EvalContext;
pub use document::Document;
pub use scheduler::Engine;

use crate::config::EngineSettings;

/// Runtime configuration of the scheduler.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time between the starts of two passes.
    pub interval: Duration,
    /// Shortest sleep between passes when a pass overruns the interval.
    pub min_sleep: Duration,
    /// Condition checks slower than this are logged.
    pub slow_check_warning: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(300),
            min_sleep: Duration::from_millis(10),
            slow_check_warning: Duration::from_millis(300),
        }
    }
}

impl From<&EngineSettings> for EngineConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            interval: Duration::from_millis(settings.interval_ms),
            min_sleep: Duration::from_millis(settings.min_sleep_ms),
            slow_check_warning: Duration::from_millis(settings.slow_check_warn_ms),
        }
    }
}

/// Result of one evaluation pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TickReport {
    /// Macros whose conditions were checked.
    pub macros_evaluated: usize,
    /// Macros whose conditions matched.
    pub macros_matched: usize,
    /// Macros skipped because they are paused.
    pub macros_paused: usize,
    /// Actions performed across all runs.
    pub actions_performed: usize,
    /// Whether the pass stopped early because of an abort.
    pub aborted: bool,
    /// Individual action runs.
    pub runs: Vec<MacroResult>,
}

impl TickReport {
    fn record(&mut self, result: MacroResult) {
        self.actions_performed += result.actions_performed;
        self.runs.push(result);
    }

    /// Add another pass's counters to this one.
    pub fn merge(&mut self, other: Self) {
        self.macros_evaluated += other.macros_evaluated;
        self.macros_matched += other.macros_matched;
        self.macros_paused += other.macros_paused;
        self.actions_performed += other.actions_performed;
        self.aborted |= other.aborted;
        self.runs.extend(other.runs);
    }
}

/// Result of running one macro's actions.
#[derive(Debug, Clone, Serialize)]
pub struct MacroResult {
    /// Macro name.
    pub macro_name: String,
    /// `true` for the action list, `false` for the else-action list.
    pub matched: bool,
    /// Actions performed.
    pub actions_performed: usize,
    /// Whether every enabled action ran.
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.interval, Duration::from_millis(300));
        assert_eq!(config.min_sleep, Duration::from_millis(10));
    }

    #[test]
    fn test_engine_config_from_settings() {
        let settings = EngineSettings {
            interval_ms: 50,
            ..EngineSettings::default()
        };
        let config = EngineConfig::from(&settings);
        assert_eq!(config.interval, Duration::from_millis(50));
    }

    #[test]
    fn test_tick_report_merge() {
        let mut total = TickReport::default();
        let mut pass = TickReport::default();
        pass.macros_evaluated = 2;
        pass.record(MacroResult {
            macro_name: "m".to_string(),
            matched: true,
            actions_performed: 3,
            completed: true,
        });
        total.merge(pass.clone());
        total.merge(pass);
        assert_eq!(total.macros_evaluated, 4);
        assert_eq!(total.actions_performed, 6);
        assert_eq!(total.runs.len(), 2);
    }
}
