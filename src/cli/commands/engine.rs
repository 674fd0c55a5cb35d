//! Commands that evaluate the document.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use colored::Colorize;
use serde_json::json;
use tracing::info;

use super::Workspace;
use crate::cli::args::{OutputFormat, RunArgs};
use crate::engine::{CancellationController, Engine, EngineConfig, TickReport};
use crate::error::AutomacroError;
use crate::output::{format_macros, format_tick_report, macro_views, to_json};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Execute run command
///
/// Runs the scheduler on its own thread until Ctrl-C or until `--ticks`
/// passes are done, then saves the document. A second Ctrl-C exits at once.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded or saved, or the
/// scheduler cannot start.
pub fn run(workspace: &Workspace, args: &RunArgs, format: OutputFormat) -> Result<String, AutomacroError> {
    let document = workspace.load_for_run()?;
    let mut config = EngineConfig::from(&workspace.config.engine);
    if let Some(interval) = args.interval {
        config.interval = Duration::from_millis(interval);
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            if stop.swap(true, Ordering::SeqCst) {
                std::process::exit(130);
            }
        })
        .map_err(|e| AutomacroError::Config(format!("Failed to install Ctrl-C handler: {e}")))?;
    }

    let mut engine = Engine::new(document, config);
    engine.start()?;
    info!(
        document = %workspace.storage.path().display(),
        interval = ?engine.interval(),
        "running; press Ctrl-C to stop"
    );

    while !stop.load(Ordering::SeqCst) {
        if args.ticks.is_some_and(|ticks| engine.tick_count() >= ticks) {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    let passes = engine.tick_count();
    let document = engine.into_document();
    workspace.save(&document)?;

    let macros = macro_views(&document);
    match format {
        OutputFormat::Json => to_json(&json!({
            "passes": passes,
            "macros": macros,
        })),
        OutputFormat::Pretty => Ok(format!(
            "Stopped after {passes} pass(es)\n\n{}",
            format_macros(&macros, format)?
        )),
    }
}

/// Execute tick command
///
/// # Errors
///
/// Returns an error if the document cannot be loaded or saved.
pub fn tick(
    workspace: &Workspace,
    count: u64,
    save: bool,
    format: OutputFormat,
) -> Result<String, AutomacroError> {
    let mut document = workspace.load()?;
    let cancel = CancellationController::new();
    let config = EngineConfig::from(&workspace.config.engine);

    let mut report = TickReport::default();
    for _ in 0..count {
        report.merge(document.tick(&cancel, &config));
    }
    if save {
        workspace.save(&document)?;
    }
    format_tick_report(&report, count, format)
}

/// Execute run-macro command
///
/// # Errors
///
/// Returns `AutomacroError::NotFound` if no macro has this name, or an error
/// if the document cannot be loaded or saved.
pub fn run_macro(
    workspace: &Workspace,
    name: &str,
    format: OutputFormat,
) -> Result<String, AutomacroError> {
    let mut document = workspace.load_existing()?;
    let result = document.run_actions(name, &CancellationController::new())?;
    workspace.save(&document)?;

    match format {
        OutputFormat::Json => to_json(&result),
        OutputFormat::Pretty => {
            let status = if result.completed {
                "✓".green()
            } else {
                "✗".red()
            };
            Ok(format!(
                "{} Ran {} action(s) of {}",
                status,
                result.actions_performed,
                result.macro_name.bold()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::test_support::write_document;
    use tempfile::TempDir;

    fn workspace(dir: &TempDir) -> Workspace {
        let path = dir.path().join("macros.json");
        write_document(&path);
        Workspace::open(Some(&dir.path().join("config.yaml")), Some(path)).unwrap()
    }

    #[test]
    fn test_tick_saves_progress() {
        let dir = TempDir::new().unwrap();
        let workspace = workspace(&dir);

        let output = tick(&workspace, 3, true, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["passes"], 3);
        assert_eq!(value["report"]["macros_matched"], 3);
        assert_eq!(value["report"]["macros_paused"], 3);

        let document = workspace.load().unwrap();
        assert_eq!(document.variables().value("counter").as_deref(), Some("3"));
    }

    #[test]
    fn test_tick_without_save() {
        let dir = TempDir::new().unwrap();
        let workspace = workspace(&dir);
        tick(&workspace, 2, false, OutputFormat::Pretty).unwrap();

        let document = workspace.load().unwrap();
        assert_eq!(document.variables().value("counter").as_deref(), Some("0"));
    }

    #[test]
    fn test_run_macro_ignores_pause() {
        let dir = TempDir::new().unwrap();
        let workspace = workspace(&dir);

        let output = run_macro(&workspace, "sleeping", OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["actions_performed"], 1);
        assert_eq!(value["completed"], true);

        assert!(matches!(
            run_macro(&workspace, "missing", OutputFormat::Json),
            Err(AutomacroError::NotFound(_))
        ));
    }
}
