// src/config/loader.rs

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};

/// Load a configuration file and return the raw, unvalidated model.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {:?}", path))?;

    let config: RawConfigFile = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML config from {:?}", path))?;

    Ok(config)
}

/// Load a configuration file and validate it.
///
/// This is the entry point for the binary: it parses TOML, applies defaults,
/// parses durations and converts every `[target.<name>]` entry.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    ConfigFile::try_from(raw).with_context(|| format!("invalid config in {:?}", path))
}

/// Like [`load_and_validate`], but a missing file at the default location
/// yields the built-in defaults instead of an error.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Err(err) if err.kind() == ErrorKind::NotFound && path == default_config_path() => {
            debug!(path = ?path, "no config file; using defaults");
            Ok(ConfigFile::default())
        }
        _ => load_and_validate(path),
    }
}

/// `Execmon.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Execmon.toml")
}
