//! Time-based post-processing of a condition result.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// How the modifier reshapes the raw condition result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationKind {
    /// Raw result.
    #[default]
    None,
    /// True after the condition held for at least the duration.
    More,
    /// True once, when the condition has held for exactly the duration.
    Equal,
    /// True while the condition has held for less than the duration.
    Less,
    /// True if the condition held at any point within the duration.
    Within,
}

impl DurationKind {
    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "No duration modifier",
            Self::More => "For at least",
            Self::Equal => "For exactly",
            Self::Less => "For at most",
            Self::Within => "Within the last",
        }
    }

    /// Map a persisted code from documents without a version.
    #[must_use]
    pub const fn from_legacy_code(code: i64) -> Self {
        match code {
            1 => Self::More,
            2 => Self::Equal,
            3 => Self::Less,
            4 => Self::Within,
            _ => Self::None,
        }
    }
}

/// Duration modifier of one condition entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DurationModifier {
    /// Modifier kind.
    #[serde(rename = "type")]
    pub kind: DurationKind,
    /// Duration in seconds.
    pub seconds: f64,
    #[serde(skip)]
    true_since: Option<Instant>,
    #[serde(skip)]
    last_true: Option<Instant>,
    #[serde(skip)]
    fired: bool,
}

impl DurationModifier {
    /// Create a modifier.
    #[must_use]
    pub const fn new(kind: DurationKind, seconds: f64) -> Self {
        Self {
            kind,
            seconds,
            true_since: None,
            last_true: None,
            fired: false,
        }
    }

    /// Whether this modifier leaves results untouched.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.kind == DurationKind::None
    }

    /// Forget accumulated timing.
    pub fn reset(&mut self) {
        self.true_since = None;
        self.last_true = None;
        self.fired = false;
    }

    fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.seconds.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Apply the modifier to a raw result observed now.
    pub fn apply(&mut self, value: bool) -> bool {
        self.apply_at(value, Instant::now())
    }

    /// Apply the modifier to a raw result observed at `now`.
    pub fn apply_at(&mut self, value: bool, now: Instant) -> bool {
        let duration = self.duration();
        if value {
            self.last_true = Some(now);
        } else {
            self.true_since = None;
            self.fired = false;
        }

        match self.kind {
            DurationKind::None => value,
            DurationKind::More => value && self.held_for(now) >= duration,
            DurationKind::Less => value && self.held_for(now) < duration,
            DurationKind::Equal => {
                if value && !self.fired && self.held_for(now) >= duration {
                    self.fired = true;
                    return true;
                }
                false
            }
            DurationKind::Within => self
                .last_true
                .is_some_and(|at| now.saturating_duration_since(at) < duration || value),
        }
    }

    fn held_for(&mut self, now: Instant) -> Duration {
        let since = *self.true_since.get_or_insert(now);
        now.saturating_duration_since(since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_none_passes_through() {
        let mut modifier = DurationModifier::new(DurationKind::None, 1.0);
        assert!(modifier.apply(true));
        assert!(!modifier.apply(false));
    }

    #[test]
    fn test_more() {
        let start = Instant::now();
        let mut modifier = DurationModifier::new(DurationKind::More, 0.1);

        assert!(!modifier.apply_at(true, start));
        assert!(!modifier.apply_at(true, start + ms(50)));
        assert!(modifier.apply_at(true, start + ms(150)));

        assert!(!modifier.apply_at(false, start + ms(160)));
        assert!(!modifier.apply_at(true, start + ms(170)));
        assert!(modifier.apply_at(true, start + ms(280)));
    }

    #[test]
    fn test_equal_fires_once() {
        let start = Instant::now();
        let mut modifier = DurationModifier::new(DurationKind::Equal, 0.1);

        assert!(!modifier.apply_at(true, start));
        assert!(!modifier.apply_at(true, start + ms(50)));
        assert!(modifier.apply_at(true, start + ms(150)));
        assert!(!modifier.apply_at(true, start + ms(160)));

        assert!(!modifier.apply_at(false, start + ms(170)));
        assert!(!modifier.apply_at(true, start + ms(180)));
    }

    #[test]
    fn test_less() {
        let start = Instant::now();
        let mut modifier = DurationModifier::new(DurationKind::Less, 0.1);

        assert!(modifier.apply_at(true, start));
        assert!(!modifier.apply_at(false, start + ms(10)));
        assert!(modifier.apply_at(true, start + ms(60)));
        assert!(!modifier.apply_at(true, start + ms(200)));

        assert!(!modifier.apply_at(false, start + ms(210)));
        assert!(modifier.apply_at(true, start + ms(220)));
    }

    #[test]
    fn test_within() {
        let start = Instant::now();
        let mut modifier = DurationModifier::new(DurationKind::Within, 0.1);

        assert!(!modifier.apply_at(false, start));
        assert!(modifier.apply_at(true, start + ms(10)));
        assert!(modifier.apply_at(false, start + ms(60)));
        assert!(!modifier.apply_at(false, start + ms(200)));
        assert!(modifier.apply_at(true, start + ms(210)));
    }

    #[test]
    fn test_serde_defaults() {
        let modifier: DurationModifier = serde_json::from_str("{}").unwrap();
        assert!(modifier.is_none());

        let modifier: DurationModifier =
            serde_json::from_str(r#"{"type": "more", "seconds": 2.5}"#).unwrap();
        assert_eq!(modifier.kind, DurationKind::More);
        assert!((modifier.seconds - 2.5).abs() < f64::EPSILON);
    }
}
