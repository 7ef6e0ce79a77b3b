// src/exec/mod.rs

//! Command execution layer.
//!
//! This module is responsible for actually running command vectors, either
//! as local child processes or over cached remote sessions, and for
//! streaming their output into a [`ProcessRecord`](crate::record::ProcessRecord).
//!
//! - [`local`] spawns child processes with `tokio::process::Command`.
//! - [`remote`] runs commands over pooled remote shell sessions.
//! - [`drain`] is the stdout/stderr pump both executors share.
//! - [`cancel`] stops a running command out-of-band.
//!
//! Executors form a closed set: [`CommandExecutor`] is an enum with exactly
//! the local and remote variants, and [`Executors::select`] picks one from
//! the request's target.

pub mod cancel;
pub(crate) mod drain;
pub mod local;
pub mod remote;

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use crate::command::Target;
use crate::errors::{ExecError, Result};
use crate::output::OutputOptions;
use crate::record::{EXIT_LOST, RecordHandle, Termination};

pub use cancel::{CancelMethod, cancel};
pub use local::LocalExecutor;
pub use remote::RemoteExecutor;

/// One command run, as handed to an executor.
///
/// `command` is the final vector, already passed through the
/// [`CommandBuilder`](crate::command::CommandBuilder).
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub id: String,
    pub command: Vec<String>,
    pub target: Target,
    pub options: OutputOptions,
}

impl RunRequest {
    pub fn new(id: impl Into<String>, command: Vec<String>, target: Target) -> Self {
        Self {
            id: id.into(),
            command,
            target,
            options: OutputOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OutputOptions) -> Self {
        self.options = options;
        self
    }
}

/// The executor chosen for a request.
#[derive(Debug, Clone)]
pub enum CommandExecutor {
    Local(LocalExecutor),
    Remote(RemoteExecutor),
}

impl CommandExecutor {
    /// Run the request, driving `record` from running to finished.
    pub async fn run(&self, request: &RunRequest, record: &RecordHandle) -> Result<Termination> {
        match (self, &request.target) {
            (CommandExecutor::Local(local), _) => {
                local
                    .run(&request.id, &request.command, record, request.options)
                    .await
            }
            (CommandExecutor::Remote(remote), Target::Remote(target)) => {
                remote
                    .run(&request.id, &request.command, target, record, request.options)
                    .await
            }
            (CommandExecutor::Remote(_), other) => Err(ExecError::config(format!(
                "remote executor cannot run a {} target",
                other.kind()
            ))),
        }
    }
}

/// The pair of executors a launcher dispatches to.
#[derive(Debug, Clone)]
pub struct Executors {
    local: LocalExecutor,
    remote: RemoteExecutor,
}

impl Executors {
    pub fn new(local: LocalExecutor, remote: RemoteExecutor) -> Self {
        Self { local, remote }
    }

    /// Remote targets go to the remote executor; local, run-as-user and
    /// container targets are local processes (their prefix is already part
    /// of the command vector).
    pub fn select(&self, target: &Target) -> CommandExecutor {
        match target {
            Target::Remote(_) => CommandExecutor::Remote(self.remote.clone()),
            Target::Local | Target::LocalAs { .. } | Target::Container { .. } => {
                CommandExecutor::Local(self.local.clone())
            }
        }
    }

    pub fn remote(&self) -> &RemoteExecutor {
        &self.remote
    }
}

/// Exit code of a finished process; signal deaths map to `128 + signal`.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(EXIT_LOST)
}
