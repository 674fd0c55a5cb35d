//! State shared by every condition and action entry of a macro.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Persisted key/value object of a single segment.
pub type SegmentData = serde_json::Map<String, serde_json::Value>;

static NEXT_SEGMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one condition or action instance.
///
/// Ids are not persisted; each loaded segment receives a fresh one. They key
/// the temp-variable blackboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(u64);

impl SegmentId {
    /// Allocate a new id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SEGMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a segment is a condition or an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Entry of the condition list.
    Condition,
    /// Entry of the action list.
    Action,
    /// Entry of the else-action list.
    ElseAction,
}

impl SegmentKind {
    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Condition => "Condition",
            Self::Action => "Action",
            Self::ElseAction => "Else action",
        }
    }
}

/// Common segment flags.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// Runtime identity.
    pub id: SegmentId,
    /// Disabled segments are skipped by evaluation and execution.
    pub enabled: bool,
    /// Editor hint; ignored by the engine.
    pub collapsed: bool,
}

impl SegmentInfo {
    /// Fresh enabled segment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SegmentId::next(),
            enabled: true,
            collapsed: false,
        }
    }

    /// Write the shared flags into a segment object.
    pub fn save(&self, data: &mut SegmentData) {
        data.insert("enabled".to_string(), self.enabled.into());
        data.insert("collapsed".to_string(), self.collapsed.into());
    }

    /// Read the shared flags. Missing fields keep their defaults.
    pub fn load(&mut self, data: &SegmentData) {
        if let Some(enabled) = data.get("enabled").and_then(serde_json::Value::as_bool) {
            self.enabled = enabled;
        }
        if let Some(collapsed) = data.get("collapsed").and_then(serde_json::Value::as_bool) {
            self.collapsed = collapsed;
        }
    }
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_ids_are_unique() {
        let a = SegmentId::next();
        let b = SegmentId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_info_defaults_when_fields_missing() {
        let mut info = SegmentInfo::new();
        info.load(&SegmentData::new());
        assert!(info.enabled);
        assert!(!info.collapsed);
    }

    #[test]
    fn test_info_save_load() {
        let mut info = SegmentInfo::new();
        info.enabled = false;
        info.collapsed = true;

        let mut data = SegmentData::new();
        info.save(&mut data);

        let mut loaded = SegmentInfo::new();
        loaded.load(&data);
        assert!(!loaded.enabled);
        assert!(loaded.collapsed);
        assert_ne!(loaded.id, info.id);
    }
}
