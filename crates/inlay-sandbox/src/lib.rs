//! Isolated execution of a target application's entry file.
//!
//! Runs one file, captures everything it writes, and keeps its side effects
//! on the hosting process's working directory contained.
//!
//! # Working-directory model
//!
//! | Runner | Strategy | Effect on the host process |
//! |--------|----------|----------------------------|
//! | [`ProcessRunner`] | per task | child gets its own cwd; host cwd untouched |
//! | [`StaticRunner`] | per task | reads the file; host cwd untouched |
//! | [`FnRunner`] | process global | cwd switched under a process-wide lock, restored on every exit path |
//!
//! Faults raised by the target never propagate: they come back as
//! [`ExecutionResult::fault`] together with whatever output was produced.
//!
//! # Example
//!
//! ```no_run
//! use inlay_sandbox::{ExecConfig, IsolatedExecutor, ProcessRunner};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = ProcessRunner::new(ExecConfig::new("php"))?;
//!     let executor = IsolatedExecutor::new(Arc::new(runner));
//!
//!     let result = executor.execute(Path::new("/srv/target/index.php")).await;
//!     println!("{}", result.output);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod executor;
mod output;
mod platform;
mod runner;

pub use config::ExecConfig;
pub use error::{RunFault, SandboxError, SandboxResult};
pub use executor::{CwdGuard, ExecutionResult, IsolatedExecutor};
pub use output::OutputSink;
pub use platform::InterpreterStatus;
pub use runner::{FnRunner, ProcessRunner, RenderFn, ScriptRunner, StaticRunner, WorkdirStrategy};
