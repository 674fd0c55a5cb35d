//! Conversion between a [`Document`] and its persisted object tree.
//!
//! Layout of the current version:
//!
//! ```text
//! { "version": 1,
//!   "variables": [ { "name", "value"?, "default_value", "save_action" } ],
//!   "macros": [ { "version": 1, "name", "pause", "on_change",
//!                 "skip_exec_on_start", "pause_save_behavior",
//!                 "check_interval_ms"?,
//!                 "conditions": [ { "id", "logic", "enabled", "collapsed",
//!                                   "duration": { "type", "seconds" }, ... } ],
//!                 "actions": [ { "id", "enabled", "collapsed", ... } ],
//!                 "else_actions": [ ... ] } ] }
//! ```
//!
//! Type-specific segment fields sit next to the shared ones and may carry
//! their own `version`.

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use super::migrate::{for_each_object, map_int, rename_key, Migrations};
use crate::engine::Document;
use crate::error::AutomacroError;
use crate::macros::{
    ActionEntry, ConditionEntry, DurationKind, DurationModifier, LogicType, Macro, MacroList,
    PauseSaveBehavior, Registry, SegmentData, SegmentInfo, SegmentKind,
};
use crate::variables::{SavedVariable, VariableStore};

const DOCUMENT_MIGRATIONS: Migrations = Migrations::new("document", &[document_v1]);
const MACRO_MIGRATIONS: Migrations = Migrations::new("macro", &[macro_v1]);

/// Current document schema version.
pub const DOCUMENT_VERSION: usize = DOCUMENT_MIGRATIONS.current_version();

/// Current macro schema version.
pub const MACRO_VERSION: usize = MACRO_MIGRATIONS.current_version();

/// Serialize a whole document.
///
/// # Errors
///
/// Returns an error if a segment fails to serialize its settings.
pub fn save_document(document: &Document) -> Result<SegmentData, AutomacroError> {
    let mut data = SegmentData::new();
    data.insert("version".to_string(), Value::from(DOCUMENT_VERSION));
    data.insert(
        "variables".to_string(),
        serde_json::to_value(document.variables().save())?,
    );

    let mut macros = Vec::with_capacity(document.macros().len());
    for (_, item) in document.macros().iter() {
        macros.push(Value::Object(save_macro(item)?));
    }
    data.insert("macros".to_string(), Value::Array(macros));
    Ok(data)
}

/// Serialize one macro.
///
/// # Errors
///
/// Returns an error if a segment fails to serialize its settings.
pub fn save_macro(item: &Macro) -> Result<SegmentData, AutomacroError> {
    let mut data = SegmentData::new();
    data.insert("version".to_string(), Value::from(MACRO_VERSION));
    data.insert("name".to_string(), Value::from(item.name()));
    data.insert("pause".to_string(), Value::from(item.is_paused()));
    data.insert("on_change".to_string(), Value::from(item.on_change()));
    data.insert(
        "skip_exec_on_start".to_string(),
        Value::from(item.skip_exec_on_start()),
    );
    data.insert(
        "pause_save_behavior".to_string(),
        serde_json::to_value(item.pause_save_behavior())?,
    );
    if let Some(interval) = item.check_interval() {
        let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        data.insert("check_interval_ms".to_string(), Value::from(millis));
    }

    let conditions = item
        .conditions()
        .iter()
        .map(save_condition)
        .collect::<Result<Vec<_>, _>>()?;
    data.insert("conditions".to_string(), Value::Array(conditions));

    let actions = item
        .actions()
        .iter()
        .map(save_action)
        .collect::<Result<Vec<_>, _>>()?;
    data.insert("actions".to_string(), Value::Array(actions));

    let else_actions = item
        .else_actions()
        .iter()
        .map(save_action)
        .collect::<Result<Vec<_>, _>>()?;
    data.insert("else_actions".to_string(), Value::Array(else_actions));
    Ok(data)
}

fn save_condition(entry: &ConditionEntry) -> Result<Value, AutomacroError> {
    let mut data = SegmentData::new();
    entry.condition.save(&mut data)?;
    data.insert("id".to_string(), Value::from(entry.condition.id()));
    data.insert("logic".to_string(), serde_json::to_value(entry.logic)?);
    data.insert("duration".to_string(), serde_json::to_value(&entry.duration)?);
    entry.info.save(&mut data);
    Ok(Value::Object(data))
}

fn save_action(entry: &ActionEntry) -> Result<Value, AutomacroError> {
    let mut data = SegmentData::new();
    entry.action.save(&mut data)?;
    data.insert("id".to_string(), Value::from(entry.action.id()));
    entry.info.save(&mut data);
    Ok(Value::Object(data))
}

/// Restore a document, migrating older layouts first.
///
/// Macros that fail to load or repeat a name are skipped with a warning, as
/// are segments with an unregistered type id or settings they reject. Macro
/// references are resolved once every macro is loaded.
///
/// # Errors
///
/// Returns an error if the document migration fails or its variables are
/// malformed.
pub fn load_document(
    mut data: SegmentData,
    registry: &Registry,
) -> Result<Document, AutomacroError> {
    DOCUMENT_MIGRATIONS.run(&mut data)?;

    let saved: Vec<SavedVariable> = match data.remove("variables") {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| AutomacroError::Document(format!("Invalid variables: {e}")))?,
        None => Vec::new(),
    };
    let mut variables = VariableStore::new();
    variables.load(saved);

    let mut macros = MacroList::new();
    if let Some(Value::Array(items)) = data.remove("macros") {
        for item in items {
            let Value::Object(object) = item else {
                warn!("skipping macro that is not an object");
                continue;
            };
            let item = match load_macro(object, registry) {
                Ok(item) => item,
                Err(e) => {
                    warn!("skipping macro: {e}");
                    continue;
                }
            };
            let name = item.name().to_string();
            if let Err(e) = macros.insert(item) {
                warn!(macro_name = %name, "skipping macro: {e}");
            }
        }
    }

    Ok(Document::from_parts(macros, variables))
}

/// Restore one macro, migrating older layouts first.
///
/// The pause flag is restored according to the macro's pause save behavior.
/// Segments that cannot be restored are dropped with a warning. References
/// to other macros are left unresolved.
///
/// # Errors
///
/// Returns an error if the migration fails or the macro has no name.
pub fn load_macro(mut data: SegmentData, registry: &Registry) -> Result<Macro, AutomacroError> {
    MACRO_MIGRATIONS.run(&mut data)?;

    let name = data
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AutomacroError::Document("Macro without a name".to_string()))?
        .to_string();

    let behavior = match data.get("pause_save_behavior") {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!(macro_name = %name, "invalid pause save behavior: {e}");
            PauseSaveBehavior::default()
        }),
        None => PauseSaveBehavior::default(),
    };
    let saved_pause = flag(&data, "pause");

    let mut item = Macro::new(&name)
        .with_paused(behavior.apply(saved_pause))
        .with_pause_save_behavior(behavior)
        .with_on_change(flag(&data, "on_change"))
        .with_skip_exec_on_start(flag(&data, "skip_exec_on_start"));
    if let Some(millis) = data.get("check_interval_ms").and_then(Value::as_u64) {
        item = item.with_check_interval(Duration::from_millis(millis));
    }

    for object in objects(&data, "conditions") {
        if let Some(entry) = load_condition(object, registry, &name) {
            item = item.with_condition_entry(entry);
        }
    }
    for (key, kind) in [
        ("actions", SegmentKind::Action),
        ("else_actions", SegmentKind::ElseAction),
    ] {
        for object in objects(&data, key) {
            if let Some(entry) = load_action(object, registry, &name) {
                item.push_action(kind, entry);
            }
        }
    }
    Ok(item)
}

fn flag(data: &SegmentData, key: &str) -> bool {
    data.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn objects<'a>(data: &'a SegmentData, key: &str) -> impl Iterator<Item = &'a SegmentData> {
    data.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn load_condition(
    data: &SegmentData,
    registry: &Registry,
    macro_name: &str,
) -> Option<ConditionEntry> {
    let id = data.get("id").and_then(Value::as_str).unwrap_or_default();
    let Some(mut condition) = registry.create_condition(id) else {
        warn!(macro_name, id, "skipping condition of unknown type");
        return None;
    };
    if let Err(e) = condition.load(data) {
        warn!(macro_name, id, "skipping condition: {e}");
        return None;
    }

    let logic = match data.get("logic") {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|_| {
            warn!(macro_name, %value, "invalid logic type; using 'and'");
            LogicType::And
        }),
        None => LogicType::default(),
    };
    let duration: DurationModifier = match data.get("duration") {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!(macro_name, "invalid duration modifier: {e}");
            DurationModifier::default()
        }),
        None => DurationModifier::default(),
    };

    let mut info = SegmentInfo::new();
    info.load(data);
    let mut entry = ConditionEntry::new(condition)
        .with_logic(logic)
        .with_duration(duration);
    entry.info = info;
    Some(entry)
}

fn load_action(
    data: &SegmentData,
    registry: &Registry,
    macro_name: &str,
) -> Option<ActionEntry> {
    let id = data.get("id").and_then(Value::as_str).unwrap_or_default();
    let Some(mut action) = registry.create_action(id) else {
        warn!(macro_name, id, "skipping action of unknown type");
        return None;
    };
    if let Err(e) = action.load(data) {
        warn!(macro_name, id, "skipping action: {e}");
        return None;
    }

    let mut entry = ActionEntry::new(action);
    entry.info.load(data);
    Some(entry)
}

/// Migration v1: snake case keys and named save policies for variables.
fn document_v1(data: &mut SegmentData) -> Result<(), AutomacroError> {
    for_each_object(data, "variables", |variable| {
        rename_key(variable, "defaultValue", "default_value");
        rename_key(variable, "saveAction", "save_action");
        map_int(variable, "save_action", |code| match code {
            0 => "dont_save",
            2 => "set_default",
            _ => "save",
        });
        Ok(())
    })
}

/// Migration v1: snake case keys, named enums and the nested duration
/// modifier of every condition.
fn macro_v1(data: &mut SegmentData) -> Result<(), AutomacroError> {
    rename_key(data, "onChange", "on_change");
    rename_key(data, "skipExecOnStart", "skip_exec_on_start");
    rename_key(data, "elseActions", "else_actions");
    rename_key(data, "pauseSaveBehavior", "pause_save_behavior");
    map_int(data, "pause_save_behavior", |code| {
        serde_json::to_value(PauseSaveBehavior::from_legacy_code(code)).unwrap_or_default()
    });

    for_each_object(data, "conditions", |condition| {
        map_int(condition, "logic", |code| {
            serde_json::to_value(LogicType::from_legacy_code(code)).unwrap_or_default()
        });
        if let Some(Value::Object(mut modifier)) = condition.remove("durationModifier") {
            map_int(&mut modifier, "type", |code| {
                serde_json::to_value(DurationKind::from_legacy_code(code)).unwrap_or_default()
            });
            condition.insert("duration".to_string(), Value::Object(modifier));
        }
        Ok(())
    })
}
