//! Execution strategies for a target's entry file.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::ExecConfig;
use crate::error::{RunFault, SandboxError, SandboxResult};
use crate::output::OutputSink;

/// How a runner relates to the process working directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkdirStrategy {
    /// The runner receives its working directory explicitly and never
    /// touches the process cwd.
    PerTask,
    /// The runner relies on the process cwd; the executor switches it
    /// under a process-wide lock.
    ProcessGlobal,
}

/// Runs a target file, writing its output into a sink.
///
/// `workdir` is the directory the target should treat as current, or
/// `None` to inherit the process cwd.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Working-directory strategy of this runner.
    fn workdir_strategy(&self) -> WorkdirStrategy {
        WorkdirStrategy::PerTask
    }

    /// Run `script` once. Output written before a fault stays in `sink`.
    async fn run(
        &self,
        script: &Path,
        workdir: Option<&Path>,
        sink: &mut OutputSink,
    ) -> Result<(), RunFault>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Process runner
// ─────────────────────────────────────────────────────────────────────────────

/// Runs the target through an interpreter child process.
///
/// The child gets its own working directory, so concurrent embeds never
/// race on the host's cwd. Stdout is captured; a non-zero exit is a fault
/// whose detail is the last line the interpreter wrote to stderr.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    config: ExecConfig,
}

impl ProcessRunner {
    /// Create a process runner.
    ///
    /// # Errors
    ///
    /// Returns an error if no interpreter is configured or the timeout is zero.
    pub fn new(config: ExecConfig) -> SandboxResult<Self> {
        if config.interpreter.trim().is_empty() {
            return Err(SandboxError::ConfigError(
                "interpreter must not be empty".to_string(),
            ));
        }
        if config.timeout.is_zero() {
            return Err(SandboxError::ConfigError(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// The runner's configuration.
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }
}

#[async_trait]
impl ScriptRunner for ProcessRunner {
    fn name(&self) -> &str {
        "process"
    }

    async fn run(
        &self,
        script: &Path,
        workdir: Option<&Path>,
        sink: &mut OutputSink,
    ) -> Result<(), RunFault> {
        let mut cmd = Command::new(&self.config.interpreter);
        cmd.args(&self.config.args);
        cmd.arg(script);

        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }

        for (key, value) in &self.config.env_vars {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(
            interpreter = %self.config.interpreter,
            script = %script.display(),
            "spawning target"
        );

        let mut child = cmd.spawn().map_err(|e| RunFault::Spawn(e.to_string()))?;
        let mut stdout = PipeReader::spawn(child.stdout.take());
        let mut stderr = PipeReader::spawn(child.stderr.take());

        let finished = timeout(self.config.timeout, async {
            let status = child.wait().await;
            stdout.finish().await;
            stderr.finish().await;
            status
        })
        .await;

        match finished {
            Ok(Ok(status)) => {
                sink.write_bytes(&stdout.take());
                if status.success() {
                    Ok(())
                } else {
                    Err(RunFault::Exited {
                        code: status.code(),
                        detail: last_line(&stderr.take()),
                    })
                }
            }
            Ok(Err(e)) => {
                sink.write_bytes(&stdout.take());
                Err(RunFault::Spawn(e.to_string()))
            }
            Err(_) => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = %e, "target already gone at timeout");
                }
                // Descendants may hold the pipe open; take what arrives in time
                let _ = timeout(DRAIN_GRACE, async {
                    let _ = child.wait().await;
                    stdout.finish().await;
                })
                .await;
                stdout.abort();
                stderr.abort();
                sink.write_bytes(&stdout.take());
                Err(RunFault::TimedOut(self.config.timeout))
            }
        }
    }
}

/// How long to keep reading stdout after a timed-out target is killed.
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Drains a child pipe on its own task, so bytes read before a timeout
/// survive it.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl PipeReader {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let task = pipe.map(|mut pipe| {
            let buf = buf.clone();
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => lock(&buf).extend_from_slice(&chunk[..n]),
                    }
                }
            })
        });
        Self { buf, task }
    }

    /// Wait for the pipe to reach end of file.
    async fn finish(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *lock(&self.buf))
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Last non-empty line the interpreter wrote to stderr.
fn last_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Static runner
// ─────────────────────────────────────────────────────────────────────────────

/// Emits the target file's contents verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRunner;

#[async_trait]
impl ScriptRunner for StaticRunner {
    fn name(&self) -> &str {
        "static"
    }

    async fn run(
        &self,
        script: &Path,
        _workdir: Option<&Path>,
        sink: &mut OutputSink,
    ) -> Result<(), RunFault> {
        let contents = tokio::fs::read(script)
            .await
            .map_err(|e| RunFault::Raised(format!("failed to read target: {e}")))?;
        sink.write_bytes(&contents);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-process runner
// ─────────────────────────────────────────────────────────────────────────────

/// Signature of an in-process renderer.
pub type RenderFn = dyn Fn(&Path, &mut OutputSink) -> Result<(), String> + Send + Sync;

/// Runs an in-process renderer against the target path.
///
/// The renderer sees the process cwd switched to the target's directory.
/// Panics are caught and reported as faults.
#[derive(Clone)]
pub struct FnRunner {
    render: Arc<RenderFn>,
}

impl FnRunner {
    pub fn new(
        render: impl Fn(&Path, &mut OutputSink) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            render: Arc::new(render),
        }
    }
}

impl std::fmt::Debug for FnRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnRunner").finish_non_exhaustive()
    }
}

#[async_trait]
impl ScriptRunner for FnRunner {
    fn name(&self) -> &str {
        "in-process"
    }

    fn workdir_strategy(&self) -> WorkdirStrategy {
        WorkdirStrategy::ProcessGlobal
    }

    async fn run(
        &self,
        script: &Path,
        _workdir: Option<&Path>,
        sink: &mut OutputSink,
    ) -> Result<(), RunFault> {
        let render: &RenderFn = self.render.as_ref();
        match panic::catch_unwind(AssertUnwindSafe(|| render(script, sink))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(RunFault::Raised(message)),
            Err(payload) => Err(RunFault::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
