//! Layered config loading.
//!
//! Layers, lowest precedence first:
//! 1. user config: `$INLAY_CONFIG_DIR/config.toml`, else
//!    `<platform config dir>/inlay/config.toml`
//! 2. `./inlay.toml`, or the file given on the command line
//! 3. `INLAY_TARGET_ROOT` and `INLAY_BASE_URL`
//!
//! CLI flags are applied by the binary on top of the result.

use std::path::{Path, PathBuf};

use crate::{ConfigError, InlayConfig, Result};

const LOCAL_FILE: &str = "inlay.toml";
const USER_FILE: &str = "config.toml";
const USER_DIR_NAME: &str = "inlay";

/// Points the user layer at a different directory.
pub const CONFIG_DIR_ENV: &str = "INLAY_CONFIG_DIR";

/// Replaces `[target] root`.
pub const TARGET_ROOT_ENV: &str = "INLAY_TARGET_ROOT";

/// Replaces `[target] base_url`.
pub const BASE_URL_ENV: &str = "INLAY_BASE_URL";

/// What happened to one config file during loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerStatus {
    Loaded,
    Missing,
    /// Present but unreadable or malformed; see the load warnings.
    Skipped,
}

impl LayerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Missing => "not found",
            Self::Skipped => "skipped",
        }
    }
}

/// One config file considered during loading.
#[derive(Debug, Clone)]
pub struct Layer {
    pub path: PathBuf,
    pub status: LayerStatus,
}

/// Merged configuration plus a record of how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: InlayConfig,
    /// Files in the order they were applied.
    pub layers: Vec<Layer>,
    /// Environment variables that replaced file values.
    pub env_overrides: Vec<&'static str>,
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of the layers that contributed values.
    pub fn loaded_paths(&self) -> Vec<&Path> {
        self.layers
            .iter()
            .filter(|layer| layer.status == LayerStatus::Loaded)
            .map(|layer| layer.path.as_path())
            .collect()
    }
}

/// Load every layer from the process environment.
///
/// `local_file` stands in for `./inlay.toml` when given.
pub fn load_config(local_file: Option<&Path>) -> Result<LoadedConfig> {
    load_config_in(local_file, None)
}

/// Like [`load_config`], reading the user layer from `user_dir` when given.
pub fn load_config_in(local_file: Option<&Path>, user_dir: Option<&Path>) -> Result<LoadedConfig> {
    let mut config = InlayConfig::new();
    let mut layers = Vec::with_capacity(2);
    let mut warnings = Vec::new();

    let user_file = user_dir
        .map(|dir| dir.join(USER_FILE))
        .or_else(user_config_file);
    let local_file = local_file.map_or_else(|| PathBuf::from(LOCAL_FILE), Path::to_path_buf);

    for path in user_file.into_iter().chain([local_file]) {
        let status = merge_layer(&mut config, &path, &mut warnings);
        layers.push(Layer { path, status });
    }

    let env_overrides = apply_env(&mut config, |key| std::env::var(key).ok());

    Ok(LoadedConfig {
        config,
        layers,
        env_overrides,
        warnings,
    })
}

/// Parse a single config file.
pub fn read_config(path: &Path) -> Result<InlayConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    InlayConfig::from_toml(&text)
}

/// Directory holding the user layer.
pub fn user_config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|base| base.join(USER_DIR_NAME)),
    }
}

/// Path of the user layer file.
pub fn user_config_file() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(USER_FILE))
}

fn merge_layer(config: &mut InlayConfig, path: &Path, warnings: &mut Vec<String>) -> LayerStatus {
    if !path.is_file() {
        return LayerStatus::Missing;
    }

    match read_config(path) {
        Ok(layer) => {
            config.merge(layer);
            tracing::debug!(path = %path.display(), "config layer merged");
            LayerStatus::Loaded
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "config layer skipped");
            warnings.push(format!("{} ignored: {e}", path.display()));
            LayerStatus::Skipped
        }
    }
}

/// Apply root and origin overrides. Empty values do not count.
fn apply_env(config: &mut InlayConfig, var: impl Fn(&str) -> Option<String>) -> Vec<&'static str> {
    let mut applied = Vec::new();
    let mut target = config.target();

    if let Some(root) = var(TARGET_ROOT_ENV).filter(|v| !v.is_empty()) {
        target.root = Some(PathBuf::from(root));
        applied.push(TARGET_ROOT_ENV);
    }
    if let Some(url) = var(BASE_URL_ENV).filter(|v| !v.is_empty()) {
        target.base_url = Some(url);
        applied.push(BASE_URL_ENV);
    }

    if !applied.is_empty() {
        config.target = Some(target);
    }
    applied
}
