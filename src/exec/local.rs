// src/exec/local.rs

//! Local child-process execution.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, warn};

use crate::errors::{ExecError, Result};
use crate::exec::drain::{DrainEnd, drain_output};
use crate::exec::exit_code;
use crate::output::OutputOptions;
use crate::record::{RecordHandle, Termination};

/// Runs commands as child processes of this process.
///
/// The command vector is executed as-is; run-as-user and container prefixes
/// are added beforehand by the [`CommandBuilder`](crate::command::CommandBuilder).
/// There is no built-in timeout: callers that need one cancel by pid.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Run `command` and drive `record` through a full run.
    ///
    /// Only [`ExecError::RecordBusy`](crate::errors::ExecError::RecordBusy)
    /// is returned as an error. Every other failure is recorded on the record
    /// (diagnostic stderr line + sentinel exit status) and returned as the
    /// matching [`Termination`].
    pub async fn run(
        &self,
        id: &str,
        command: &[String],
        record: &RecordHandle,
        options: OutputOptions,
    ) -> Result<Termination> {
        record.begin_run(id, options.clear_on_reload)?;

        let Some((program, args)) = command.split_first() else {
            warn!(record = %id, "refusing to spawn an empty command");
            record.fail(
                Termination::SpawnFailed,
                ExecError::Spawn("cannot spawn an empty command".into()),
            );
            return Ok(Termination::SpawnFailed);
        };

        info!(record = %id, cmd = ?command, "starting local process");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(record = %id, program = %program, error = %err, "failed to spawn local process");
                record.fail(
                    Termination::SpawnFailed,
                    ExecError::Spawn(format!("failed to spawn {program}: {err}")),
                );
                return Ok(Termination::SpawnFailed);
            }
        };

        let pid = child.id();
        record.set_pid(pid);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        if let DrainEnd::Failed(err) =
            drain_output(stdout, stderr, record, options.end_in_newlines, None).await
        {
            warn!(record = %id, ?pid, error = %err, "reading process output failed; waiting for exit");
        }

        let termination = match child.wait().await {
            Ok(status) => Termination::Exited(exit_code(status)),
            Err(err) => {
                warn!(record = %id, ?pid, error = %err, "failed to wait for local process");
                record.fail(Termination::Lost, format!("failed to wait for process: {err}"));
                return Ok(Termination::Lost);
            }
        };

        info!(
            record = %id,
            ?pid,
            exit_status = termination.code(),
            success = termination.success(),
            "local process exited"
        );
        record.finish(termination);
        Ok(termination)
    }
}
