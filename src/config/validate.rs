// src/config/validate.rs

use crate::config::model::RawConfigFile;
use crate::errors::{ExecError, Result};

/// Basic semantic checks on a freshly parsed configuration.
///
/// This checks:
/// - `max_workers >= 1` and `session_cache_size >= 1`
/// - escalation prefixes are non-empty
/// - target names are usable as identifiers
///
/// Duration strings and target descriptors are checked while converting
/// into [`ConfigFile`](crate::config::ConfigFile).
pub fn validate_raw(cfg: &RawConfigFile) -> Result<()> {
    validate_limits(cfg)?;
    validate_escalation(cfg)?;
    validate_target_names(cfg)?;
    Ok(())
}

fn validate_limits(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.max_workers == 0 {
        return Err(ExecError::config("[config].max_workers must be >= 1 (got 0)"));
    }
    if cfg.remote.session_cache_size == 0 {
        return Err(ExecError::config(
            "[remote].session_cache_size must be >= 1 (got 0)",
        ));
    }
    Ok(())
}

fn validate_escalation(cfg: &RawConfigFile) -> Result<()> {
    let escalation = &cfg.escalation;
    if escalation.sudo.is_empty() {
        return Err(ExecError::config("[escalation].sudo must not be empty"));
    }
    if escalation.container_exec.is_empty() {
        return Err(ExecError::config(
            "[escalation].container_exec must not be empty",
        ));
    }
    if escalation.kill_helper.as_ref().is_some_and(|helper| helper.is_empty()) {
        return Err(ExecError::config(
            "[escalation].kill_helper must not be empty when set",
        ));
    }
    Ok(())
}

fn validate_target_names(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.target.keys() {
        if name.trim().is_empty() {
            return Err(ExecError::config("target names must not be blank"));
        }
    }
    Ok(())
}
