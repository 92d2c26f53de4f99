//! Process runner configuration.

use std::time::Duration;

/// Configuration for running a target through an interpreter process.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Interpreter binary (name on `PATH` or absolute path).
    pub interpreter: String,

    /// Arguments placed before the script path.
    pub args: Vec<String>,

    /// Execution timeout.
    pub timeout: Duration,

    /// Environment variables to pass to the interpreter.
    pub env_vars: Vec<(String, String)>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            interpreter: "php".to_string(),
            args: Vec::new(),
            timeout: Duration::from_secs(30),
            env_vars: Vec::new(),
        }
    }
}

impl ExecConfig {
    /// Create a configuration for the given interpreter.
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            ..Self::default()
        }
    }

    /// Set the interpreter arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set the execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add an environment variable.
    pub fn add_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }
}
