//! Start an external program.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::EvalContext;
use crate::error::AutomacroError;
use crate::macros::{load_settings, save_settings, Action, SegmentData};
use crate::variables::{substitute, VariableStore};

pub(super) const ID: &str = "run";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    path: String,
    args: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    working_directory: String,
    wait: bool,
    timeout_seconds: f64,
}

/// Action spawning a process.
///
/// When waiting, completion is polled through the cancellation controller;
/// an abort kills the process and stops the action list. A zero timeout
/// waits until the process exits. A process that cannot be started is
/// logged and skipped.
///
/// Processes started without waiting are kept until they exit and are
/// reaped on later runs, or in the background once the action is dropped.
#[derive(Debug, Default)]
pub struct RunAction {
    settings: Settings,
    children: Vec<Child>,
}

impl RunAction {
    /// Run `path` without waiting.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            settings: Settings {
                path: path.into(),
                ..Settings::default()
            },
            children: Vec::new(),
        }
    }

    /// Arguments. Each may contain `${name}`.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Directory to start in.
    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.settings.working_directory = dir.into();
        self
    }

    /// Wait for the process, at most `timeout_seconds` if positive.
    #[must_use]
    pub fn with_wait(mut self, timeout_seconds: f64) -> Self {
        self.settings.wait = true;
        self.settings.timeout_seconds = timeout_seconds;
        self
    }

    fn command(&self, variables: &VariableStore) -> Command {
        let mut command = Command::new(substitute(&self.settings.path, variables));
        command
            .args(self.settings.args.iter().map(|a| substitute(a, variables)))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if !self.settings.working_directory.is_empty() {
            command.current_dir(PathBuf::from(substitute(
                &self.settings.working_directory,
                variables,
            )));
        }
        command
    }

    fn timeout(&self) -> Option<Duration> {
        if self.settings.timeout_seconds > 0.0 {
            Duration::try_from_secs_f64(self.settings.timeout_seconds).ok()
        } else {
            None
        }
    }

    /// Poll until the child exits. `false` if the wait was aborted.
    fn wait_for_exit(&self, child: &mut Child, ctx: &EvalContext<'_>) -> bool {
        let deadline = self
            .timeout()
            .and_then(|timeout| Instant::now().checked_add(timeout));
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if status.success() {
                        debug!(path = %self.settings.path, "process finished");
                    } else {
                        warn!(path = %self.settings.path, %status, "process failed");
                    }
                    return true;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %self.settings.path, "failed to poll process: {e}");
                    return true;
                }
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!(path = %self.settings.path, "process timed out; killing it");
                kill(child);
                return true;
            }
            if ctx.wait(POLL_INTERVAL).is_aborted() {
                debug!(path = %self.settings.path, "wait aborted; killing process");
                kill(child);
                return false;
            }
        }
    }
}

impl RunAction {
    /// Keep a child that is not waited for, collecting those that exited.
    fn detach(&mut self, child: Child) {
        self.reap();
        self.children.push(child);
    }

    fn reap(&mut self) {
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = child.id(), %status, "detached process exited");
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(pid = child.id(), "failed to poll process: {e}");
                false
            }
        });
    }
}

impl Drop for RunAction {
    fn drop(&mut self) {
        self.reap();
        for mut child in self.children.drain(..) {
            let pid = child.id();
            let reaper = thread::Builder::new()
                .name(format!("reap-{pid}"))
                .spawn(move || {
                    let _ = child.wait();
                });
            if let Err(e) = reaper {
                warn!(pid, "failed to start reaper thread: {e}");
            }
        }
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("failed to kill process: {e}");
    }
    let _ = child.wait();
}

impl Action for RunAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn perform(&mut self, ctx: &mut EvalContext<'_>) -> bool {
        let mut child = match self.command(ctx.variables()).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(path = %self.settings.path, "failed to start process: {e}");
                return true;
            }
        };
        if !self.settings.wait {
            self.detach(child);
            return true;
        }
        self.wait_for_exit(&mut child, ctx)
    }

    fn save(&self, data: &mut SegmentData) -> Result<(), AutomacroError> {
        save_settings(&self.settings, data)
    }

    fn load(&mut self, data: &SegmentData) -> Result<(), AutomacroError> {
        self.settings = load_settings(data)?;
        Ok(())
    }

    fn short_description(&self) -> String {
        let mut description = format!("run {}", self.settings.path);
        for arg in &self.settings.args {
            description.push(' ');
            description.push_str(arg);
        }
        description
    }

    fn resolve_variables_to_fixed_values(&mut self, variables: &VariableStore) {
        self.settings.path = substitute(&self.settings.path, variables);
        for arg in &mut self.settings.args {
            *arg = substitute(arg, variables);
        }
        self.settings.working_directory = substitute(&self.settings.working_directory, variables);
    }
}
