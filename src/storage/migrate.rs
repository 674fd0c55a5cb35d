//! Versioned migrations of persisted objects.
//!
//! Every persisted object (document, macro, segment) carries a numeric
//! `version` field. An object without one is treated as version 0. Each
//! migration step upgrades an object by exactly one version and steps are
//! chained until the object reaches the latest version. Migration happens
//! once at load time; nothing downstream ever looks at old layouts.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AutomacroError;
use crate::macros::SegmentData;

/// Key holding the schema version of a persisted object.
pub const VERSION_KEY: &str = "version";

/// Upgrade an object from one version to the next.
pub type MigrationStep = fn(&mut SegmentData) -> Result<(), AutomacroError>;

/// Get the schema version of an object.
///
/// Returns 0 if no version has been set (oldest schema).
#[must_use]
pub fn get_version(data: &SegmentData) -> usize {
    data.get(VERSION_KEY)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(0)
}

/// Set the schema version of an object.
pub fn set_version(data: &mut SegmentData, version: usize) {
    data.insert(VERSION_KEY.to_string(), Value::from(version));
}

/// The migration chain of one kind of persisted object.
///
/// Step `n` upgrades version `n` to version `n + 1`, so the latest version is
/// the number of steps.
#[derive(Debug, Clone, Copy)]
pub struct Migrations {
    name: &'static str,
    steps: &'static [MigrationStep],
}

impl Migrations {
    /// Create a migration chain.
    #[must_use]
    pub const fn new(name: &'static str, steps: &'static [MigrationStep]) -> Self {
        Self { name, steps }
    }

    /// Latest schema version.
    #[must_use]
    pub const fn current_version(&self) -> usize {
        self.steps.len()
    }

    /// Run all pending migrations and stamp the latest version.
    ///
    /// Objects written by a newer version are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration step fails.
    pub fn run(&self, data: &mut SegmentData) -> Result<(), AutomacroError> {
        let current = get_version(data);
        let latest = self.current_version();

        if current > latest {
            warn!(
                object = self.name,
                version = current,
                latest,
                "unknown version; loading as is"
            );
            return Ok(());
        }

        for version in current..latest {
            self.run_migration(data, version)?;
            set_version(data, version + 1);
        }
        if current < latest {
            debug!(object = self.name, from = current, to = latest, "migrated");
        }
        set_version(data, latest);
        Ok(())
    }

    /// Run a specific migration.
    fn run_migration(&self, data: &mut SegmentData, version: usize) -> Result<(), AutomacroError> {
        let step = self.steps.get(version).ok_or_else(|| {
            AutomacroError::Document(format!(
                "Unknown {} migration version: {version}",
                self.name
            ))
        })?;
        step(data).map_err(|e| {
            AutomacroError::Document(format!(
                "{} migration v{} failed: {e}",
                self.name,
                version + 1
            ))
        })
    }
}

/// Move a field to a new key, keeping an existing value under the new key.
pub fn rename_key(data: &mut SegmentData, from: &str, to: &str) {
    if let Some(value) = data.remove(from) {
        data.entry(to.to_string()).or_insert(value);
    }
}

/// Replace an integer field with the result of `map`.
///
/// Non-integer values are left as they are.
pub fn map_int<T, F>(data: &mut SegmentData, key: &str, map: F)
where
    T: Into<Value>,
    F: FnOnce(i64) -> T,
{
    if let Some(code) = data.get(key).and_then(Value::as_i64) {
        data.insert(key.to_string(), map(code).into());
    }
}

/// Apply `step` to every object of an array field.
///
/// # Errors
///
/// Returns the first error reported by `step`.
pub fn for_each_object<F>(data: &mut SegmentData, key: &str, mut step: F) -> Result<(), AutomacroError>
where
    F: FnMut(&mut SegmentData) -> Result<(), AutomacroError>,
{
    if let Some(Value::Array(items)) = data.get_mut(key) {
        for item in items {
            if let Value::Object(object) = item {
                step(object)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> SegmentData {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn add_a(data: &mut SegmentData) -> Result<(), AutomacroError> {
        data.insert("a".to_string(), json!(1));
        Ok(())
    }

    fn double_a(data: &mut SegmentData) -> Result<(), AutomacroError> {
        let a = data.get("a").and_then(Value::as_i64).unwrap_or(0);
        data.insert("a".to_string(), json!(a * 2));
        Ok(())
    }

    fn fail(_data: &mut SegmentData) -> Result<(), AutomacroError> {
        Err(AutomacroError::Parse("bad field".to_string()))
    }

    const TEST: Migrations = Migrations::new("test", &[add_a, double_a]);

    #[test]
    fn test_missing_version_is_zero() {
        assert_eq!(get_version(&SegmentData::new()), 0);
        assert_eq!(get_version(&object(json!({"version": 3}))), 3);
    }

    #[test]
    fn test_chain_from_oldest() {
        let mut data = SegmentData::new();
        TEST.run(&mut data).unwrap();
        assert_eq!(data.get("a"), Some(&json!(2)));
        assert_eq!(get_version(&data), 2);
    }

    #[test]
    fn test_partial_chain() {
        let mut data = object(json!({"version": 1, "a": 5}));
        TEST.run(&mut data).unwrap();
        assert_eq!(data.get("a"), Some(&json!(10)));
    }

    #[test]
    fn test_current_version_untouched() {
        let mut data = object(json!({"version": 2, "a": 5}));
        TEST.run(&mut data).unwrap();
        assert_eq!(data.get("a"), Some(&json!(5)));
    }

    #[test]
    fn test_newer_version_left_alone() {
        let mut data = object(json!({"version": 9, "a": 5}));
        TEST.run(&mut data).unwrap();
        assert_eq!(get_version(&data), 9);
        assert_eq!(data.get("a"), Some(&json!(5)));
    }

    #[test]
    fn test_failing_step_reports_version() {
        const FAILING: Migrations = Migrations::new("broken", &[fail]);
        let err = FAILING.run(&mut SegmentData::new()).unwrap_err();
        assert!(err.to_string().contains("broken migration v1"));
    }

    #[test]
    fn test_helpers() {
        let mut data = object(json!({
            "oldName": 1,
            "code": 2,
            "items": [{"x": 1}, {"x": 2}, "skip"]
        }));
        rename_key(&mut data, "oldName", "new_name");
        map_int(&mut data, "code", |c| format!("code-{c}"));
        for_each_object(&mut data, "items", |item| {
            item.insert("seen".to_string(), json!(true));
            Ok(())
        })
        .unwrap();

        assert_eq!(data.get("new_name"), Some(&json!(1)));
        assert!(data.get("oldName").is_none());
        assert_eq!(data.get("code"), Some(&json!("code-2")));
        assert_eq!(data["items"][1]["seen"], json!(true));
    }
}
