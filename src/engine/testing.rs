//! Condition and action doubles for engine tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::context::EvalContext;
use crate::error::AutomacroError;
use crate::macros::{Action, Condition, SegmentData};
use crate::variables::{TempVarDecl, TempVarRef};

/// Condition returning a shared, switchable value and counting its checks.
pub struct Fixed {
    value: Arc<AtomicBool>,
    checks: Arc<AtomicUsize>,
}

impl Fixed {
    pub fn boxed(value: bool) -> Box<dyn Condition> {
        Box::new(Self {
            value: Arc::new(AtomicBool::new(value)),
            checks: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn shared(value: &Arc<AtomicBool>, checks: &Arc<AtomicUsize>) -> Box<dyn Condition> {
        Box::new(Self {
            value: Arc::clone(value),
            checks: Arc::clone(checks),
        })
    }
}

impl Condition for Fixed {
    fn id(&self) -> &'static str {
        "fixed"
    }

    fn check(&mut self, _ctx: &mut EvalContext<'_>) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.value.load(Ordering::SeqCst)
    }

    fn save(&self, data: &mut SegmentData) -> Result<(), AutomacroError> {
        data.insert("value".to_string(), self.value.load(Ordering::SeqCst).into());
        Ok(())
    }

    fn load(&mut self, data: &SegmentData) -> Result<(), AutomacroError> {
        if let Some(value) = data.get("value").and_then(serde_json::Value::as_bool) {
            self.value.store(value, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Condition publishing a temp variable `value` and reporting what an
/// earlier condition published before it.
pub struct Publisher {
    pub value: String,
    pub seen: Arc<parking_lot::Mutex<Vec<Option<String>>>>,
    pub reads: Option<TempVarRef>,
}

impl Condition for Publisher {
    fn id(&self) -> &'static str {
        "publisher"
    }

    fn check(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        if let Some(reference) = &self.reads {
            let seen = ctx.read_temp_var(reference).map(str::to_string);
            self.seen.lock().push(seen);
        }
        ctx.publish_temp_var("value", self.value.clone());
        true
    }

    fn save(&self, _data: &mut SegmentData) -> Result<(), AutomacroError> {
        Ok(())
    }

    fn load(&mut self, _data: &SegmentData) -> Result<(), AutomacroError> {
        Ok(())
    }

    fn temp_vars(&self) -> Vec<TempVarDecl> {
        vec![TempVarDecl::new("value", "Value")]
    }
}

/// Action counting its runs and optionally stopping the sequence.
pub struct CountingAction {
    runs: Arc<AtomicUsize>,
    result: bool,
}

impl CountingAction {
    pub fn boxed(runs: &Arc<AtomicUsize>) -> Box<dyn Action> {
        Box::new(Self {
            runs: Arc::clone(runs),
            result: true,
        })
    }

    pub fn failing(runs: &Arc<AtomicUsize>) -> Box<dyn Action> {
        Box::new(Self {
            runs: Arc::clone(runs),
            result: false,
        })
    }
}

impl Action for CountingAction {
    fn id(&self) -> &'static str {
        "counting"
    }

    fn perform(&mut self, _ctx: &mut EvalContext<'_>) -> bool {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.result
    }

    fn save(&self, _data: &mut SegmentData) -> Result<(), AutomacroError> {
        Ok(())
    }

    fn load(&mut self, _data: &SegmentData) -> Result<(), AutomacroError> {
        Ok(())
    }
}

/// Action waiting through the cancellation controller.
pub struct SleepAction {
    duration: Duration,
}

impl SleepAction {
    pub fn boxed(duration: Duration) -> Box<dyn Action> {
        Box::new(Self { duration })
    }
}

impl Action for SleepAction {
    fn id(&self) -> &'static str {
        "sleep"
    }

    fn perform(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        !ctx.wait(self.duration).is_aborted()
    }

    fn save(&self, _data: &mut SegmentData) -> Result<(), AutomacroError> {
        Ok(())
    }

    fn load(&mut self, _data: &SegmentData) -> Result<(), AutomacroError> {
        Ok(())
    }
}

/// Action pausing its own macro.
pub struct PauseSelf;

impl Action for PauseSelf {
    fn id(&self) -> &'static str {
        "pause_self"
    }

    fn perform(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        let key = ctx.current_macro_key();
        if let Some(item) = ctx.macros_mut().get_mut(key) {
            item.set_paused(true);
        }
        true
    }

    fn save(&self, _data: &mut SegmentData) -> Result<(), AutomacroError> {
        Ok(())
    }

    fn load(&mut self, _data: &SegmentData) -> Result<(), AutomacroError> {
        Ok(())
    }
}
