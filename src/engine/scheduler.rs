//! The scheduler thread and the engine handle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use super::cancel::CancellationController;
use super::document::Document;
use super::{EngineConfig, MacroResult, TickReport};
use crate::error::AutomacroError;

struct Shared {
    document: Mutex<Document>,
    wake: Condvar,
    cancel: CancellationController,
    running: AtomicBool,
    interval_ms: AtomicU64,
    ticks: AtomicU64,
    config: EngineConfig,
}

/// Owns a document and evaluates it periodically on a scheduler thread.
///
/// Every pass and every edit holds the same lock for its whole critical
/// section, so a long action without a cancellable wait delays everything.
pub struct Engine {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    /// Create a stopped engine.
    #[must_use]
    pub fn new(document: Document, config: EngineConfig) -> Self {
        let interval_ms = u64::try_from(config.interval.as_millis()).unwrap_or(u64::MAX);
        Self {
            shared: Arc::new(Shared {
                document: Mutex::new(document),
                wake: Condvar::new(),
                cancel: CancellationController::new(),
                running: AtomicBool::new(false),
                interval_ms: AtomicU64::new(interval_ms),
                ticks: AtomicU64::new(0),
                config,
            }),
            worker: None,
        }
    }

    /// Start the scheduler thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is already running or the thread
    /// cannot be spawned.
    pub fn start(&mut self) -> Result<(), AutomacroError> {
        if self.worker.is_some() {
            return Err(AutomacroError::Config(
                "Engine is already running".to_string(),
            ));
        }
        self.shared.cancel.resume();
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("automacro-scheduler".to_string())
            .spawn(move || run_scheduler(&shared))
            .map_err(|e| {
                self.shared.running.store(false, Ordering::SeqCst);
                AutomacroError::Config(format!("Failed to start scheduler thread: {e}"))
            })?;
        self.worker = Some(handle);
        Ok(())
    }

    /// Stop the scheduler thread and wait for it to exit.
    ///
    /// Pending waits are interrupted first, so this returns promptly even
    /// while an action is sleeping.
    pub fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.cancel.shutdown();
        {
            let _document = self.shared.document.lock();
            self.shared.wake.notify_all();
        }
        if handle.join().is_err() {
            warn!("scheduler thread panicked");
        }
        self.shared.cancel.resume();
        info!("scheduler stopped");
    }

    /// Whether the scheduler thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.is_some() && self.shared.running.load(Ordering::SeqCst)
    }

    /// Current pass interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.shared.interval_ms.load(Ordering::SeqCst))
    }

    /// Change the pass interval. A running scheduler picks it up before its
    /// next sleep.
    pub fn set_interval(&self, interval: Duration) {
        let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.shared.interval_ms.store(millis, Ordering::SeqCst);
        debug!(interval_ms = millis, "interval changed");
    }

    /// Number of passes run by the scheduler so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.shared.ticks.load(Ordering::SeqCst)
    }

    /// Wake the scheduler for an immediate pass.
    pub fn request_evaluation(&self) {
        let _document = self.shared.document.lock();
        self.shared.wake.notify_all();
    }

    /// The shared cancellation controller.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationController {
        &self.shared.cancel
    }

    /// Interrupt every action currently waiting.
    pub fn abort_waits(&self) {
        self.shared.cancel.abort();
    }

    /// Read the document under the coordination lock.
    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        let document = self.shared.document.lock();
        f(&document)
    }

    /// Mutate the document under the coordination lock.
    ///
    /// In-flight waits are interrupted while the lock is awaited. Temp
    /// variable declarations and macro references are refreshed afterwards.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let _hold = self.shared.cancel.hold();
        let mut document = self.shared.document.lock();
        let result = f(&mut document);
        document.post_load();
        result
    }

    /// Replace the whole document.
    pub fn replace_document(&self, replacement: Document) -> Document {
        self.edit(|document| std::mem::replace(document, replacement))
    }

    /// Run one pass on the calling thread.
    pub fn tick(&self) -> TickReport {
        let mut document = self.shared.document.lock();
        self.shared.cancel.clear();
        let report = document.tick(&self.shared.cancel, &self.shared.config);
        self.shared.ticks.fetch_add(1, Ordering::SeqCst);
        report
    }

    /// Run a macro's actions now, regardless of pause state or conditions.
    ///
    /// # Errors
    ///
    /// Returns an error if no macro has this name.
    pub fn run_macro(&self, name: &str) -> Result<MacroResult, AutomacroError> {
        let mut document = self.shared.document.lock();
        document.run_actions(name, &self.shared.cancel)
    }

    /// Stop the engine and return its document.
    #[must_use]
    pub fn into_document(mut self) -> Document {
        self.stop();
        let shared = std::mem::replace(
            &mut self.shared,
            Arc::new(Shared {
                document: Mutex::new(Document::new()),
                wake: Condvar::new(),
                cancel: CancellationController::new(),
                running: AtomicBool::new(false),
                interval_ms: AtomicU64::new(0),
                ticks: AtomicU64::new(0),
                config: EngineConfig::default(),
            }),
        );
        match Arc::try_unwrap(shared) {
            Ok(shared) => shared.document.into_inner(),
            Err(shared) => std::mem::take(&mut *shared.document.lock()),
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_scheduler(shared: &Shared) {
    info!(
        interval_ms = shared.interval_ms.load(Ordering::SeqCst),
        "scheduler started"
    );
    let mut run_time = Duration::ZERO;
    let mut document = shared.document.lock();

    while shared.running.load(Ordering::SeqCst) {
        let interval = Duration::from_millis(shared.interval_ms.load(Ordering::SeqCst));
        let sleep = match interval.checked_sub(run_time) {
            Some(remaining) if remaining >= Duration::from_millis(1) => remaining,
            _ => {
                debug!(?run_time, "pass overran the interval; busy loop detected");
                shared.config.min_sleep
            }
        };

        // Releases the lock while sleeping; editors get in here.
        shared.wake.wait_for(&mut document, sleep);
        if !shared.running.load(Ordering::SeqCst) {
            break;
        }

        let started = Instant::now();
        shared.cancel.clear();
        let report = document.tick(&shared.cancel, &shared.config);
        run_time = started.elapsed();
        shared.ticks.fetch_add(1, Ordering::SeqCst);
        trace!(
            evaluated = report.macros_evaluated,
            matched = report.macros_matched,
            actions = report.actions_performed,
            ?run_time,
            "pass complete"
        );
    }
    info!("scheduler exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{CountingAction, Fixed, SleepAction};
    use crate::macros::{LogicType, Macro};
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn wait_for_ticks(engine: &Engine, ticks: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.tick_count() < ticks && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            interval: Duration::from_millis(10),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_scheduler_runs_matching_macro() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut document = Document::new();
        document
            .add_macro(
                Macro::new("m")
                    .with_condition(LogicType::And, Fixed::boxed(true))
                    .with_action(CountingAction::boxed(&runs)),
            )
            .unwrap();

        let mut engine = Engine::new(document, fast_config());
        engine.start().unwrap();
        wait_for_ticks(&engine, 3);
        engine.stop();

        assert!(!engine.is_running());
        assert!(runs.load(Ordering::SeqCst) >= 3);
        let run_count = engine.read(|d| d.macros().by_name("m").map(Macro::run_count));
        assert_eq!(run_count, Some(runs.load(Ordering::SeqCst) as u64));
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut engine = Engine::new(Document::new(), fast_config());
        engine.start().unwrap();
        assert!(engine.start().is_err());
        engine.stop();
    }

    #[test]
    fn test_stop_interrupts_sleeping_action() {
        let mut document = Document::new();
        document
            .add_macro(
                Macro::new("sleeper")
                    .with_condition(LogicType::And, Fixed::boxed(true))
                    .with_action(SleepAction::boxed(Duration::from_secs(10))),
            )
            .unwrap();

        let mut engine = Engine::new(document, fast_config());
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        engine.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_edit_interrupts_sleeping_action() {
        let mut document = Document::new();
        document
            .add_macro(
                Macro::new("sleeper")
                    .with_condition(LogicType::And, Fixed::boxed(true))
                    .with_action(SleepAction::boxed(Duration::from_secs(10))),
            )
            .unwrap();

        let mut engine = Engine::new(document, fast_config());
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        engine.edit(|d| d.set_paused("sleeper", true)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        engine.stop();
    }

    #[test]
    fn test_interval_is_hot_reconfigurable() {
        let mut engine = Engine::new(Document::new(), EngineConfig::default());
        assert_eq!(engine.interval(), Duration::from_millis(300));
        engine.start().unwrap();
        engine.set_interval(Duration::from_millis(5));
        engine.request_evaluation();
        wait_for_ticks(&engine, 10);
        engine.stop();
        assert!(engine.tick_count() >= 10);
    }

    #[test]
    fn test_manual_tick_and_run_macro() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut document = Document::new();
        document
            .add_macro(
                Macro::new("m")
                    .with_paused(true)
                    .with_condition(LogicType::And, Fixed::boxed(true))
                    .with_action(CountingAction::boxed(&runs)),
            )
            .unwrap();
        let engine = Engine::new(document, fast_config());

        let report = engine.tick();
        assert_eq!(report.macros_paused, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        engine.run_macro("m").unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(engine.run_macro("missing").is_err());
    }

    #[test]
    fn test_into_document() {
        let mut document = Document::new();
        document.add_macro(Macro::new("kept")).unwrap();
        let engine = Engine::new(document, fast_config());
        let document = engine.into_document();
        assert!(document.macros().find("kept").is_some());
    }
}
