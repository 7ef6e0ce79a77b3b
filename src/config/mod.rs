// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed raw model and the validated model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like limits and prefixes (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, MAX_RECORD_TTL, RawConfigFile, RemoteSettings, WatchdogSettings, parse_duration,
};
pub use validate::validate_raw;
