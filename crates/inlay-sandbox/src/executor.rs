//! Isolated execution with working-directory containment.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use tokio::sync::Mutex;

use crate::error::RunFault;
use crate::output::OutputSink;
use crate::runner::{ScriptRunner, WorkdirStrategy};

/// Serializes switch-run-restore for runners that use the process cwd.
static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Outcome of one execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Everything the target wrote, including output produced before a fault.
    pub output: String,
    /// Fault raised by the target, if any.
    pub fault: Option<RunFault>,
    /// Non-fatal problems (directory switch or restore failures).
    pub warnings: Vec<String>,
}

impl ExecutionResult {
    /// Whether the target ran to completion.
    pub fn is_success(&self) -> bool {
        self.fault.is_none()
    }
}

/// Restores the process working directory when dropped.
///
/// Captures the cwd at construction. If it could not be read, restoration
/// is skipped.
#[derive(Debug)]
pub struct CwdGuard {
    original: Option<PathBuf>,
    restored: bool,
}

impl CwdGuard {
    /// Record the current working directory.
    pub fn capture() -> Self {
        Self {
            original: std::env::current_dir().ok(),
            restored: false,
        }
    }

    /// The directory that will be restored, if it was readable.
    pub fn original(&self) -> Option<&Path> {
        self.original.as_deref()
    }

    /// Restore the recorded directory now.
    ///
    /// Idempotent; later calls and the drop become no-ops.
    pub fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        match &self.original {
            Some(dir) => std::env::set_current_dir(dir),
            None => Ok(()),
        }
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!(error = %e, "failed to restore working directory");
        }
    }
}

/// Runs a target's entry file exactly once with its output captured.
///
/// Faults raised by the target are caught and returned in the result; the
/// process working directory is the same after `execute` returns as before.
#[derive(Clone)]
pub struct IsolatedExecutor {
    runner: Arc<dyn ScriptRunner>,
}

impl IsolatedExecutor {
    pub fn new(runner: Arc<dyn ScriptRunner>) -> Self {
        Self { runner }
    }

    /// The underlying runner.
    pub fn runner(&self) -> &dyn ScriptRunner {
        self.runner.as_ref()
    }

    /// Execute `script`, switching into its directory for the run.
    pub async fn execute(&self, script: &Path) -> ExecutionResult {
        let mut warnings = Vec::new();
        let mut sink = OutputSink::new();
        let target_dir = script.parent().filter(|d| d.is_dir());

        if target_dir.is_none() {
            warn(
                &mut warnings,
                format!(
                    "target directory of {} unavailable; running in current directory",
                    script.display()
                ),
            );
        }

        let outcome = match self.runner.workdir_strategy() {
            WorkdirStrategy::PerTask => self.runner.run(script, target_dir, &mut sink).await,
            WorkdirStrategy::ProcessGlobal => {
                let _lock = CWD_LOCK.lock().await;
                let mut guard = CwdGuard::capture();
                if guard.original().is_none() {
                    warn(
                        &mut warnings,
                        "working directory unavailable at entry; restoration skipped".to_string(),
                    );
                }

                if let Some(dir) = target_dir
                    && let Err(e) = std::env::set_current_dir(dir)
                {
                    warn(
                        &mut warnings,
                        format!("could not switch to {}: {e}", dir.display()),
                    );
                }

                let outcome = self.runner.run(script, target_dir, &mut sink).await;

                if let Err(e) = guard.restore() {
                    warn(
                        &mut warnings,
                        format!("could not restore working directory: {e}"),
                    );
                }
                outcome
            }
        };

        let fault = outcome.err();
        if let Some(fault) = &fault {
            tracing::warn!(
                runner = self.runner.name(),
                script = %script.display(),
                fault = %fault,
                "target raised a fault"
            );
        } else {
            tracing::debug!(
                runner = self.runner.name(),
                script = %script.display(),
                bytes = sink.len(),
                "target executed"
            );
        }

        ExecutionResult {
            output: sink.into_string(),
            fault,
            warnings,
        }
    }
}

impl std::fmt::Debug for IsolatedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolatedExecutor")
            .field("runner", &self.runner.name())
            .finish()
    }
}

fn warn(warnings: &mut Vec<String>, message: String) {
    tracing::warn!(warning = %message, "execution warning");
    warnings.push(message);
}
