//! Sequential logic fold over a macro's condition results.
//!
//! The fold is flat and ordered: the first folded entry seeds the accumulator
//! and every later entry is combined with AND or OR, optionally negated. The
//! seed's operator is ignored unless it is [`LogicType::Not`], which negates
//! it. Callers evaluate every condition before folding, so no
//! check is ever skipped because the outcome is already decided.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a condition result is combined with the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicType {
    /// `acc && value`
    #[default]
    And,
    /// `acc || value`
    Or,
    /// `acc && !value`
    AndNot,
    /// `acc || !value`
    OrNot,
    /// `!value` as the seed; `acc && !value` anywhere else.
    Not,
    /// Checked for its side effects only; not folded.
    Ignore,
}

impl LogicType {
    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::And => "And",
            Self::Or => "Or",
            Self::AndNot => "And not",
            Self::OrNot => "Or not",
            Self::Not => "Not",
            Self::Ignore => "Ignore",
        }
    }

    /// Combine an accumulator with the next value.
    #[must_use]
    pub const fn apply(self, acc: bool, value: bool) -> bool {
        match self {
            Self::And => acc && value,
            Self::Or => acc || value,
            Self::AndNot | Self::Not => acc && !value,
            Self::OrNot => acc || !value,
            Self::Ignore => acc,
        }
    }

    /// Map a persisted logic code from documents without a version.
    ///
    /// Codes: 0 root, 1 negated root, 100 ignore, 101 and, 102 or,
    /// 103 and-not, 104 or-not. Unknown codes fall back to `And`.
    #[must_use]
    pub fn from_legacy_code(code: i64) -> Self {
        match code {
            0 | 101 => Self::And,
            1 => Self::Not,
            100 => Self::Ignore,
            102 => Self::Or,
            103 => Self::AndNot,
            104 => Self::OrNot,
            other => {
                warn!(code = other, "invalid logic type; using 'and'");
                Self::And
            }
        }
    }
}

/// Fold already evaluated results in order.
///
/// Returns `false` when nothing takes part in the fold.
pub fn fold<I>(results: I) -> bool
where
    I: IntoIterator<Item = (LogicType, bool)>,
{
    let mut acc: Option<bool> = None;
    for (logic, value) in results {
        if logic == LogicType::Ignore {
            continue;
        }
        acc = Some(match acc {
            None if logic == LogicType::Not => !value,
            None => value,
            Some(current) => logic.apply(current, value),
        });
    }
    acc.unwrap_or(false)
}
