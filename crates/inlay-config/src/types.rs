//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [target]      # where the embedded application lives and which origin serves it
//! [execution]   # how the target's entry file is run
//! [output]      # asset handling, sanitization, envelope classes
//! [sanitize]    # allow-list extensions
//! [logging]     # optional JSON log directory
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InlayConfig {
    /// Target application location and origin.
    pub target: Option<TargetConfig>,

    /// Isolated execution settings.
    pub execution: Option<ExecutionConfig>,

    /// Output shaping.
    pub output: Option<OutputConfig>,

    /// Sanitizer allow-list extensions.
    pub sanitize: Option<SanitizeConfig>,

    /// Log file configuration.
    pub logging: Option<LoggingConfig>,
}

impl InlayConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: InlayConfig) {
        if other.target.is_some() {
            self.target = other.target;
        }
        if other.execution.is_some() {
            self.execution = other.execution;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.sanitize.is_some() {
            self.sanitize = other.sanitize;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Effective `[target]` section.
    pub fn target(&self) -> TargetConfig {
        self.target.clone().unwrap_or_default()
    }

    /// Effective `[execution]` section.
    pub fn execution(&self) -> ExecutionConfig {
        self.execution.clone().unwrap_or_default()
    }

    /// Effective `[output]` section.
    pub fn output(&self) -> OutputConfig {
        self.output.clone().unwrap_or_default()
    }

    /// Effective `[sanitize]` section.
    pub fn sanitize(&self) -> SanitizeConfig {
        self.sanitize.clone().unwrap_or_default()
    }

    /// Effective `[logging]` section.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Target Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default entry file name used when a request names no path.
pub const DEFAULT_ENTRY: &str = "index.php";

/// Location of the target application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Document root of the target application.
    pub root: Option<PathBuf>,

    /// Document root of the hosting application. When `root` is unset the
    /// target root is the sibling directory named after the origin host.
    pub host_root: Option<PathBuf>,

    /// Origin serving the target application, e.g. `https://target.example`.
    pub base_url: Option<String>,

    /// Entry file used when a request does not name one.
    pub entry: String,

    /// File extensions a request may name. Empty disables the check.
    pub allowed_extensions: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            root: None,
            host_root: None,
            base_url: None,
            entry: DEFAULT_ENTRY.to_string(),
            allowed_extensions: vec!["php".to_string()],
        }
    }
}

impl TargetConfig {
    /// The configured root, or the default derived from `host_root` and the
    /// origin host.
    ///
    /// Returns `None` when neither can be determined; callers surface that
    /// as a configuration error at embed time.
    pub fn effective_root(&self) -> Option<PathBuf> {
        if let Some(root) = self.root.as_ref().filter(|r| !r.as_os_str().is_empty()) {
            return Some(root.clone());
        }

        let host_root = self.host_root.as_ref()?;
        let origin = url::Url::parse(self.base_url.as_deref()?).ok()?;
        let host = origin.host_str()?;
        Some(host_root.parent()?.join(host))
    }

    /// The validated origin with trailing slashes removed.
    pub fn origin(&self) -> Result<String> {
        match self.base_url.as_deref() {
            Some(raw) => normalize_origin(raw),
            None => Err(ConfigError::InvalidBaseUrl {
                url: String::new(),
                reason: "not configured".to_string(),
            }),
        }
    }
}

/// Validate an origin URL and strip trailing slashes.
///
/// The origin must be an absolute `http` or `https` URL with a host.
pub fn normalize_origin(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let parsed = url::Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(trimmed.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Execution Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Which runner executes the target's entry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    /// Spawn the configured interpreter with the file as its script.
    #[default]
    Process,
    /// Emit the file's contents verbatim.
    Static,
}

/// What a fault raised by the target does to the embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultSeverity {
    /// Render only the error envelope.
    #[default]
    Abort,
    /// Render the partial output, followed by the error envelope.
    Degrade,
}

/// Isolated execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub runner: RunnerKind,
    /// Interpreter binary for the process runner.
    pub interpreter: String,
    /// Extra arguments placed before the script path.
    pub args: Vec<String>,
    pub timeout_secs: u64,
    /// Environment passed to the interpreter.
    pub env: BTreeMap<String, String>,
    pub fault_severity: FaultSeverity,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            runner: RunnerKind::Process,
            interpreter: "php".to_string(),
            args: Vec::new(),
            timeout_secs: 30,
            env: BTreeMap::new(),
            fault_severity: FaultSeverity::Abort,
        }
    }
}

impl ExecutionConfig {
    /// Timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// How asset references in captured output are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetMode {
    /// Extract stylesheets and scripts, rewrite their URLs against the
    /// origin and hand them to the asset registry.
    #[default]
    Register,
    /// Leave the captured output as produced.
    Inline,
}

/// Output shaping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub assets: AssetMode,
    /// Apply the allow-list sanitizer to the fragment.
    pub sanitize: bool,
    /// Prefix for envelope classes and asset handles.
    pub class_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            assets: AssetMode::Register,
            sanitize: true,
            class_prefix: "inlay".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sanitizer Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Additions to the default sanitizer allow-list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Extra tags mapped to the attributes they may carry.
    pub allow: BTreeMap<String, Vec<String>>,
    /// URL schemes allowed in `href`/`src`/`cite`. `None` keeps the default.
    pub protocols: Option<Vec<String>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Log file settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily-rotated JSON logs. Unset disables file logging.
    pub dir: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
