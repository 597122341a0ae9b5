//! Loads [`EngineConfig`] from an optional TOML file, following the
//! reference codebase's convention of `NODE_ENV`/`LOG_LEVEL` coming from the
//! environment while everything else comes through the config file.

use std::path::Path;

use anyhow::{Context, Result};
use tl_engine::EngineConfig;

pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config file at {}", path.display()))
}

pub fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

pub fn is_production() -> bool {
    std::env::var("NODE_ENV").map(|v| v == "production").unwrap_or(false)
}
