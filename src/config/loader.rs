// Configuration loader
// Layers: TOML file (--config, $MODELSERVE_CONFIG or ~/.modelserve/config.toml),
// then MODELSERVE__* environment overrides.

use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::settings::Config;
use crate::errors::config_parse_error;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "MODELSERVE_CONFIG";

/// Load configuration from file and environment
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = resolve_config_path(explicit)?;

    let mut builder = config::Config::builder();
    if let Some(path) = &path {
        tracing::debug!(path = %path.display(), "Loading config file");
        builder = builder.add_source(config::File::from(path.as_path()).required(true));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("MODELSERVE")
            .prefix_separator("__")
            .separator("__"),
    );

    let settings = builder
        .build()
        .map_err(|e| anyhow!(config_parse_error(&e.to_string())))?;
    let mut config: Config = settings
        .try_deserialize()
        .map_err(|e| anyhow!(config_parse_error(&e.to_string())))?;

    // Relative model roots follow the config file, not the working directory
    if let Some(parent) = path.as_deref().and_then(Path::parent) {
        if config.model_root.is_relative() {
            config.model_root = parent.join(&config.model_root);
        }
    }

    config.validate()?;
    Ok(config)
}

fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("Config file not found: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Ok(Some(PathBuf::from(path)));
        }
    }

    Ok(default_config_path().filter(|p| p.exists()))
}

/// `~/.modelserve/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".modelserve").join("config.toml"))
}

/// Write a config as TOML, creating parent directories
pub fn write_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
