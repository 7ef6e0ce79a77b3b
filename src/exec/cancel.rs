// src/exec/cancel.rs

//! Out-of-band cancellation of running commands.
//!
//! Cancelling never touches the record directly: the executor that owns the
//! run notices the process dying and settles the record as usual, so pollers
//! simply see the exit status arrive.

use std::process::Stdio;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::{info, warn};

use crate::command::EscalationConfig;
use crate::errors::{ExecError, Result};
use crate::record::RecordHandle;

/// How to stop a running local process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelMethod {
    /// Send SIGTERM to the tracked pid.
    Signal,
    /// Run a privileged helper with the pid appended, for processes owned by
    /// another user or whole process trees.
    Helper(Vec<String>),
}

impl CancelMethod {
    /// The helper from `[escalation].kill_helper` if configured, plain
    /// signals otherwise.
    pub fn from_escalation(escalation: &EscalationConfig) -> Self {
        match &escalation.kill_helper {
            Some(helper) if !helper.is_empty() => CancelMethod::Helper(helper.clone()),
            _ => CancelMethod::Signal,
        }
    }
}

/// Request termination of the process currently running on `record`.
///
/// Fails with [`ExecError::Cancel`] if the record has no running local
/// process (remote runs, finished runs) or the signal/helper fails.
pub async fn cancel(id: &str, record: &RecordHandle, method: &CancelMethod) -> Result<()> {
    let pid = record
        .with(|r| if r.is_running() { r.pid() } else { None })
        .ok_or_else(|| ExecError::Cancel(format!("{id} has no running local process")))?;

    match method {
        CancelMethod::Signal => {
            let raw = i32::try_from(pid)
                .map_err(|_| ExecError::Cancel(format!("pid {pid} out of range")))?;
            kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|e| {
                ExecError::Cancel(format!("failed to signal pid {pid}: {e}"))
            })?;
        }
        CancelMethod::Helper(helper) => {
            let Some((program, args)) = helper.split_first() else {
                return Err(ExecError::Cancel("kill helper is empty".to_string()));
            };
            let status = Command::new(program)
                .args(args)
                .arg(pid.to_string())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| ExecError::Cancel(format!("running {program}: {e}")))?;
            if !status.success() {
                warn!(record = %id, pid, %status, "kill helper failed");
                return Err(ExecError::Cancel(format!(
                    "{program} exited with {status} for pid {pid}"
                )));
            }
        }
    }

    info!(record = %id, pid, ?method, "cancellation requested");
    Ok(())
}
