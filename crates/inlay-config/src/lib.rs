//! Configuration system for inlay.
//!
//! Provides TOML-based configuration with:
//! - A `[target]` section locating the embedded application (root, origin, extensions)
//! - Execution settings for the isolated runner (`[execution]`)
//! - Output shaping: asset handling, sanitization, envelope classes (`[output]`, `[sanitize]`)
//! - Config file layering (XDG user config + project-local overrides + env overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    BASE_URL_ENV, CONFIG_DIR_ENV, Layer, LayerStatus, LoadedConfig, TARGET_ROOT_ENV, load_config,
    load_config_in, read_config, user_config_dir, user_config_file,
};
pub use error::{ConfigError, Result};
pub use types::*;
