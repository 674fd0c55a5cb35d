//! Interruptible waits for long-running actions.
//!
//! The controller combines a level-triggered abort flag with a condition
//! variable. Waiters re-check the flag after every wake, so spurious wakeups
//! and overlapping abort causes are harmless. Notifiers take the wait lock
//! before broadcasting, which closes the window between a waiter's flag check
//! and its call to wait.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// How a bounded wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration passed.
    Elapsed,
    /// The wait was interrupted. The caller should stop now.
    Aborted,
}

impl WaitOutcome {
    /// Whether the wait was interrupted.
    #[must_use]
    pub const fn is_aborted(self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Shared abort flag plus wait/notify primitive.
#[derive(Debug, Default)]
pub struct CancellationController {
    abort: AtomicBool,
    shutdown: AtomicBool,
    holds: AtomicUsize,
    lock: Mutex<()>,
    wake: Condvar,
}

impl CancellationController {
    /// Create a controller with no abort pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt current waits. Stays set until [`clear`](Self::clear).
    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
        self.notify();
    }

    /// Clear a one-shot abort. Shutdown and active holds are unaffected.
    pub fn clear(&self) {
        self.abort.store(false, Ordering::SeqCst);
    }

    /// Interrupt waits until [`resume`](Self::resume) is called.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify();
    }

    /// Leave the shut-down state.
    pub fn resume(&self) {
        self.shutdown.store(false, Ordering::SeqCst);
        self.abort.store(false, Ordering::SeqCst);
    }

    /// Whether shutdown was requested.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Keep waits interrupted for as long as the guard lives.
    ///
    /// Editors hold this while they wait for the coordination lock, so an
    /// in-flight action gives the lock up quickly.
    #[must_use]
    pub fn hold(&self) -> AbortGuard<'_> {
        self.holds.fetch_add(1, Ordering::SeqCst);
        self.notify();
        AbortGuard { controller: self }
    }

    /// Whether waits should stop now.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
            || self.shutdown.load(Ordering::SeqCst)
            || self.holds.load(Ordering::SeqCst) > 0
    }

    /// Wait for up to `duration`, returning early on abort.
    pub fn wait_for(&self, duration: Duration) -> WaitOutcome {
        match Instant::now().checked_add(duration) {
            Some(deadline) => self.wait_until(deadline),
            None => self.wait_until_aborted(),
        }
    }

    /// Wait until `deadline`, returning early on abort.
    pub fn wait_until(&self, deadline: Instant) -> WaitOutcome {
        let mut guard = self.lock.lock();
        loop {
            if self.is_aborted() {
                debug!("wait aborted");
                return WaitOutcome::Aborted;
            }
            if Instant::now() >= deadline {
                return WaitOutcome::Elapsed;
            }
            self.wake.wait_until(&mut guard, deadline);
        }
    }

    fn wait_until_aborted(&self) -> WaitOutcome {
        let mut guard = self.lock.lock();
        while !self.is_aborted() {
            self.wake.wait(&mut guard);
        }
        WaitOutcome::Aborted
    }

    fn notify(&self) {
        let _guard = self.lock.lock();
        self.wake.notify_all();
    }
}

/// Releases an abort hold on drop.
#[derive(Debug)]
pub struct AbortGuard<'a> {
    controller: &'a CancellationController,
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        self.controller.holds.fetch_sub(1, Ordering::SeqCst);
    }
}
