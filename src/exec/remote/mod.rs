// src/exec/remote/mod.rs

//! Remote execution over cached shell sessions.
//!
//! - [`transport`] defines the `RemoteTransport` / `RemoteSession` seam.
//! - [`openssh`] is the production transport (OpenSSH control masters).
//! - [`pool`] caches sessions with probing and LRU eviction.

pub mod openssh;
pub mod pool;
pub mod transport;

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::command::RemoteTarget;
use crate::errors::{ExecError, Result};
use crate::exec::drain::{DrainEnd, drain_output};
use crate::exec::exit_code;
use crate::output::OutputOptions;
use crate::record::{RecordHandle, Termination};

pub use openssh::{OpenSshConfig, OpenSshTransport};
pub use pool::{PoolConfig, SessionPool};
pub use transport::{RemoteSession, RemoteTransport, SessionKey, join_command, shell_quote};

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs commands over pooled remote sessions.
///
/// Three terminal outcomes are kept apart on the record:
/// - `Exited(code)`: the remote command ran and exited,
/// - `SessionFailed`: connecting, probing or the channel itself failed; the
///   session is dropped from the pool so a retry reconnects,
/// - `TimedOut`: no output arrived within the read timeout; the channel is
///   killed and everything captured so far is kept.
#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    pool: Arc<SessionPool>,
    read_timeout: Duration,
}

impl RemoteExecutor {
    pub fn new(pool: Arc<SessionPool>, read_timeout: Duration) -> Self {
        Self { pool, read_timeout }
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub async fn run(
        &self,
        id: &str,
        command: &[String],
        target: &RemoteTarget,
        record: &RecordHandle,
        options: OutputOptions,
    ) -> Result<Termination> {
        record.begin_run(id, options.clear_on_reload)?;
        Ok(self.run_started(id, command, target, record, options).await)
    }

    async fn run_started(
        &self,
        id: &str,
        command: &[String],
        target: &RemoteTarget,
        record: &RecordHandle,
        options: OutputOptions,
    ) -> Termination {
        let host = target.host.as_str();

        if command.is_empty() {
            warn!(record = %id, host, "refusing to run an empty remote command");
            record.fail(
                Termination::SpawnFailed,
                ExecError::Spawn("cannot run an empty command".into()),
            );
            return Termination::SpawnFailed;
        }

        let session = match self.pool.acquire(target).await {
            Ok(session) => session,
            Err(err) => {
                warn!(record = %id, host, user = %target.user, error = %err, "remote session unavailable");
                record.fail(Termination::SessionFailed, &err);
                return Termination::SessionFailed;
            }
        };

        info!(record = %id, host, user = %target.user, cmd = ?command, "starting remote command");

        let mut cmd = session.command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut channel = match cmd.spawn() {
            Ok(channel) => channel,
            Err(err) => {
                warn!(record = %id, host, error = %err, "failed to open remote channel");
                self.pool.invalidate(target, &session).await;
                record.fail(
                    Termination::SessionFailed,
                    ExecError::Session(format!("failed to open channel to {host}: {err}")),
                );
                return Termination::SessionFailed;
            }
        };

        let stdout = channel.stdout.take();
        let stderr = channel.stderr.take();
        match drain_output(
            stdout,
            stderr,
            record,
            options.end_in_newlines,
            Some(self.read_timeout),
        )
        .await
        {
            DrainEnd::Closed => {}
            DrainEnd::TimedOut => {
                let _ = channel.kill().await;
                return self.timed_out(id, host, record);
            }
            DrainEnd::Failed(err) => {
                let _ = channel.kill().await;
                warn!(record = %id, host, error = %err, "remote channel read failed");
                self.pool.invalidate(target, &session).await;
                record.fail(
                    Termination::SessionFailed,
                    ExecError::Session(format!("channel to {host} failed: {err}")),
                );
                return Termination::SessionFailed;
            }
        }

        // Output is closed; the exit status should follow right away.
        let status = match tokio::time::timeout(self.read_timeout, channel.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                warn!(record = %id, host, error = %err, "failed to collect remote exit status");
                self.pool.invalidate(target, &session).await;
                record.fail(
                    Termination::SessionFailed,
                    ExecError::Session(format!("lost exit status from {host}: {err}")),
                );
                return Termination::SessionFailed;
            }
            Err(_) => {
                let _ = channel.kill().await;
                return self.timed_out(id, host, record);
            }
        };

        let code = exit_code(status);
        if session.transport_failure_code() == Some(code) {
            warn!(record = %id, host, exit_status = code, "remote session failed mid-command");
            self.pool.invalidate(target, &session).await;
            record.fail(
                Termination::SessionFailed,
                ExecError::Session(format!("session to {host} failed (exit {code})")),
            );
            return Termination::SessionFailed;
        }

        let termination = Termination::Exited(code);
        info!(
            record = %id,
            host,
            exit_status = code,
            success = termination.success(),
            "remote command exited"
        );
        record.finish(termination);
        termination
    }

    fn timed_out(&self, id: &str, host: &str, record: &RecordHandle) -> Termination {
        warn!(record = %id, host, timeout = ?self.read_timeout, "remote read timed out; command abandoned");
        record.fail(
            Termination::TimedOut,
            format!("{host}: {}; command abandoned", ExecError::Timeout(self.read_timeout)),
        );
        Termination::TimedOut
    }
}
