// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Executors never return transport failures through this type: a command
//! that fails to spawn, loses its session or times out is recorded as data
//! on its `ProcessRecord`. What surfaces here are caller mistakes
//! (bad target, busy record, unknown id) and admission decisions.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Spawn error: {0}")]
    Spawn(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Read timed out after {0:?}")]
    Timeout(Duration),

    #[error("Process record not found: {0}")]
    NotFound(String),

    #[error("Process record is busy: {0}")]
    RecordBusy(String),

    #[error("Launch rejected, retry later: {0}")]
    LaunchRejected(String),

    #[error("Cancellation failed: {0}")]
    Cancel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ExecError::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;
