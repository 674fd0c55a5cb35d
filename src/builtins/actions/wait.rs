//! Pause the action list for a while.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::EvalContext;
use crate::error::AutomacroError;
use crate::macros::{load_settings, save_settings, Action, SegmentData};
use crate::storage::migrate::{map_int, rename_key, set_version, Migrations};

pub(super) const ID: &str = "wait";

const MIGRATIONS: Migrations = Migrations::new("wait action", &[settings_v1]);

/// How the wait time is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitType {
    /// Always `seconds`.
    #[default]
    Fixed,
    /// Uniformly between `seconds` and `seconds2`.
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    wait_type: WaitType,
    seconds: f64,
    seconds2: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wait_type: WaitType::Fixed,
            seconds: 1.0,
            seconds2: 1.0,
        }
    }
}

/// Action sleeping through the cancellation controller.
///
/// Stops the action list when the wait is interrupted.
#[derive(Debug, Default)]
pub struct WaitAction {
    settings: Settings,
}

impl WaitAction {
    /// Wait a fixed time.
    #[must_use]
    pub fn fixed(seconds: f64) -> Self {
        Self {
            settings: Settings {
                wait_type: WaitType::Fixed,
                seconds,
                seconds2: seconds,
            },
        }
    }

    /// Wait a random time between two bounds.
    #[must_use]
    pub fn random(min: f64, max: f64) -> Self {
        Self {
            settings: Settings {
                wait_type: WaitType::Random,
                seconds: min,
                seconds2: max,
            },
        }
    }

    fn duration(&self) -> Duration {
        let seconds = match self.settings.wait_type {
            WaitType::Fixed => self.settings.seconds,
            WaitType::Random => {
                let low = self.settings.seconds.min(self.settings.seconds2);
                let high = self.settings.seconds.max(self.settings.seconds2);
                if high > low {
                    rand::thread_rng().gen_range(low..=high)
                } else {
                    low
                }
            }
        };
        Duration::try_from_secs_f64(seconds).unwrap_or_default()
    }
}

impl Action for WaitAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn perform(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        let duration = self.duration();
        debug!(?duration, "waiting");
        !ctx.wait(duration).is_aborted()
    }

    fn save(&self, data: &mut SegmentData) -> Result<(), AutomacroError> {
        save_settings(&self.settings, data)?;
        set_version(data, MIGRATIONS.current_version());
        Ok(())
    }

    fn load(&mut self, data: &SegmentData) -> Result<(), AutomacroError> {
        let mut data = data.clone();
        MIGRATIONS.run(&mut data)?;
        self.settings = load_settings(&data)?;
        Ok(())
    }

    fn short_description(&self) -> String {
        match self.settings.wait_type {
            WaitType::Fixed => format!("wait {}s", self.settings.seconds),
            WaitType::Random => format!(
                "wait {}s to {}s",
                self.settings.seconds, self.settings.seconds2
            ),
        }
    }
}

/// Migration v1: named wait type.
fn settings_v1(data: &mut SegmentData) -> Result<(), AutomacroError> {
    rename_key(data, "waitType", "wait_type");
    map_int(data, "wait_type", |code| {
        if code == 1 {
            "random"
        } else {
            "fixed"
        }
    });
    Ok(())
}
