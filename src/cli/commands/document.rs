//! Commands that inspect or rewrite the document file.

use std::collections::HashSet;
use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use super::Workspace;
use crate::cli::args::OutputFormat;
use crate::error::AutomacroError;
use crate::macros::{PauseSaveBehavior, Registry, SegmentData};
use crate::output::to_json;
use crate::storage::{
    get_version, load_document, DocumentStorage, DOCUMENT_VERSION, MACRO_VERSION,
};

/// Outcome of `validate`.
#[derive(Debug, Serialize)]
struct Validation {
    path: PathBuf,
    version: usize,
    macros: usize,
    variables: usize,
    problems: Vec<String>,
    valid: bool,
}

fn segment_lists(item: &SegmentData) -> impl Iterator<Item = (&str, &SegmentData)> {
    ["conditions", "actions", "else_actions", "elseActions"]
        .into_iter()
        .flat_map(move |key| {
            item.get(key)
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_object)
                .map(move |segment| (key, segment))
        })
}

/// Problems visible in the raw tree, before anything is skipped on load.
fn raw_problems(data: &SegmentData, registry: &Registry) -> Vec<String> {
    let mut problems = Vec::new();
    if get_version(data) > DOCUMENT_VERSION {
        problems.push(format!(
            "document version {} is newer than {DOCUMENT_VERSION}",
            get_version(data)
        ));
    }

    let mut names = HashSet::new();
    let macros = data.get("macros").and_then(Value::as_array);
    for (index, item) in macros.into_iter().flatten().enumerate() {
        let Some(item) = item.as_object() else {
            problems.push(format!("macro {index} is not an object"));
            continue;
        };
        let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
        if name.is_empty() {
            problems.push(format!("macro {index} has no name"));
        } else if !names.insert(name.to_string()) {
            problems.push(format!("macro '{name}' is defined more than once"));
        }
        if get_version(item) > MACRO_VERSION {
            problems.push(format!(
                "macro '{name}' version {} is newer than {MACRO_VERSION}",
                get_version(item)
            ));
        }

        if let Some(behavior @ Value::String(_)) = item.get("pause_save_behavior") {
            if let Err(e) = serde_json::from_value::<PauseSaveBehavior>(behavior.clone()) {
                problems.push(format!("macro '{name}': pause_save_behavior: {e}"));
            }
        }

        for (list, segment) in segment_lists(item) {
            let id = segment.get("id").and_then(Value::as_str).unwrap_or_default();
            let loaded = if list == "conditions" {
                registry
                    .create_condition(id)
                    .map(|mut condition| condition.load(segment))
            } else {
                registry
                    .create_action(id)
                    .map(|mut action| action.load(segment))
            };
            match loaded {
                None => problems.push(format!("macro '{name}': unknown {list} type '{id}'")),
                Some(Err(e)) => problems.push(format!("macro '{name}': {list} '{id}': {e}")),
                Some(Ok(())) => {}
            }
        }
    }
    problems
}

/// Execute validate command
///
/// # Errors
///
/// Returns `AutomacroError::NotFound` if there is no document file, or an
/// error if the file is not a readable object tree.
pub fn validate(workspace: &Workspace, format: OutputFormat) -> Result<String, AutomacroError> {
    let path = workspace.storage.path().to_path_buf();
    let data = workspace
        .storage
        .read_raw()?
        .ok_or_else(|| AutomacroError::NotFound(format!("Document {}", path.display())))?;

    let version = get_version(&data);
    let mut problems = raw_problems(&data, &workspace.registry);
    let (macros, variables) = match load_document(data, &workspace.registry) {
        Ok(document) => {
            for (_, item) in document.macros().iter() {
                let conditions = item.conditions().len();
                for entry in item.actions().iter().chain(item.else_actions()) {
                    for reference in entry.action.temp_var_refs() {
                        if reference.index >= conditions {
                            problems.push(format!(
                                "macro '{}': action reads temp variable of missing condition {}",
                                item.name(),
                                reference.index
                            ));
                        }
                    }
                }
            }
            (document.macros().len(), document.variables().len())
        }
        Err(e) => {
            problems.push(e.to_string());
            (0, 0)
        }
    };

    let validation = Validation {
        path,
        version,
        macros,
        variables,
        valid: problems.is_empty(),
        problems,
    };

    match format {
        OutputFormat::Json => to_json(&validation),
        OutputFormat::Pretty => {
            let mut lines = vec![format!(
                "{} (version {}, {} macros, {} variables)",
                validation.path.display().to_string().bold(),
                validation.version,
                validation.macros,
                validation.variables
            )];
            if validation.valid {
                lines.push(format!("{} No problems found", "✓".green()));
            } else {
                for problem in &validation.problems {
                    lines.push(format!("{} {problem}", "✗".red()));
                }
            }
            Ok(lines.join("\n"))
        }
    }
}

/// Execute migrate command
///
/// # Errors
///
/// Returns `AutomacroError::NotFound` if there is no document file, or an
/// error if it cannot be loaded or written.
pub fn migrate(
    workspace: &Workspace,
    to: Option<PathBuf>,
    format: OutputFormat,
) -> Result<String, AutomacroError> {
    let from = workspace.storage.path().to_path_buf();
    let version = workspace
        .storage
        .read_raw()?
        .map(|data| get_version(&data))
        .ok_or_else(|| AutomacroError::NotFound(format!("Document {}", from.display())))?;
    let document = workspace.load_existing()?;

    let target = DocumentStorage::with_path(to.unwrap_or_else(|| from.clone()));
    target.save(&document)?;

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({
            "from": from,
            "to": target.path(),
            "from_version": version,
            "to_version": DOCUMENT_VERSION,
        })),
        OutputFormat::Pretty => Ok(format!(
            "{} Migrated {} from version {version} to {DOCUMENT_VERSION}, saved to {}",
            "✓".green(),
            from.display(),
            target.path().display()
        )),
    }
}

/// Execute pause and unpause commands
///
/// # Errors
///
/// Returns `AutomacroError::NotFound` if no macro has this name.
pub fn set_paused(
    workspace: &Workspace,
    name: &str,
    paused: bool,
    format: OutputFormat,
) -> Result<String, AutomacroError> {
    let mut document = workspace.load_existing()?;
    document.set_paused(name, paused)?;
    workspace.save(&document)?;

    let verb = if paused { "Paused" } else { "Unpaused" };
    match format {
        OutputFormat::Json => to_json(&serde_json::json!({
            "name": name,
            "paused": paused,
        })),
        OutputFormat::Pretty => Ok(format!("{} {verb} {}", "✓".green(), name.bold())),
    }
}
