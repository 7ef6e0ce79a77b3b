// src/exec/remote/openssh.rs

//! OpenSSH control-master transport.
//!
//! One master connection per session key (`ssh -M -S <socket> -f -N`);
//! commands are multiplexed over it with `ssh -S <socket>`, the liveness
//! probe is `ssh -O check` and closing is `ssh -O stop`, which lets
//! in-flight commands finish before the master exits.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{ExecError, Result};
use crate::exec::remote::transport::{
    BoxFuture, RemoteSession, RemoteTransport, SessionKey, join_command,
};

/// Exit code `ssh` uses for its own failures.
const SSH_FAILURE_CODE: i32 = 255;

/// Settings for the OpenSSH transport (the `[remote]` config section).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSshConfig {
    pub ssh_program: PathBuf,
    /// Directory holding control sockets and master logs.
    pub control_dir: PathBuf,
    pub connect_timeout: Duration,
}

impl Default for OpenSshConfig {
    fn default() -> Self {
        Self {
            ssh_program: PathBuf::from("ssh"),
            control_dir: std::env::temp_dir().join("execmon-ssh"),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpenSshTransport {
    config: OpenSshConfig,
}

impl OpenSshTransport {
    pub fn new(config: OpenSshConfig) -> Self {
        Self { config }
    }

    /// Control socket path for a key.
    ///
    /// Unix socket paths are limited to ~100 bytes, so the key is hashed
    /// rather than spelled out.
    pub fn control_socket(&self, key: &SessionKey) -> PathBuf {
        let material = format!(
            "{}\0{}\0{}\0{}",
            key.user,
            key.host,
            key.port.unwrap_or(22),
            key.credential
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );
        let hash = blake3::hash(material.as_bytes()).to_hex();
        self.config.control_dir.join(format!("{}.sock", &hash[..16]))
    }

    async fn open_master(&self, key: &SessionKey) -> Result<OpenSshSession> {
        if let Some(credential) = &key.credential {
            if !tokio::fs::try_exists(credential).await.unwrap_or(false) {
                return Err(ExecError::Session(format!(
                    "credential file {} not found",
                    credential.display()
                )));
            }
        }

        tokio::fs::create_dir_all(&self.config.control_dir)
            .await
            .map_err(|e| {
                ExecError::Session(format!(
                    "creating control directory {}: {e}",
                    self.config.control_dir.display()
                ))
            })?;

        let socket = self.control_socket(key);
        let log = socket.with_extension("log");
        let _ = tokio::fs::remove_file(&log).await;

        let session = OpenSshSession {
            ssh_program: self.config.ssh_program.clone(),
            socket,
            key: key.clone(),
        };

        let mut cmd = Command::new(&self.config.ssh_program);
        cmd.arg("-M")
            .arg("-S")
            .arg(&session.socket)
            .args(["-f", "-N"])
            .args(["-o", "BatchMode=yes", "-o", "ControlPersist=yes"])
            .args(["-o", "StrictHostKeyChecking=accept-new"])
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                self.config.connect_timeout.as_secs().max(1)
            ))
            .arg("-E")
            .arg(&log);
        if let Some(credential) = &key.credential {
            cmd.arg("-i").arg(credential).args(["-o", "IdentitiesOnly=yes"]);
        }
        session.add_login_args(&mut cmd);
        cmd.arg(&key.host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        debug!(host = %key.host, user = %key.user, socket = %session.socket.display(), "starting ssh control master");

        // `-f` makes ssh return once authentication is done, so the master
        // command itself finishes quickly; give it a little slack on top of
        // ssh's own connect timeout.
        let limit = self.config.connect_timeout + Duration::from_secs(5);
        let status = match tokio::time::timeout(limit, cmd.status()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(ExecError::Session(format!(
                    "running {}: {e}",
                    self.config.ssh_program.display()
                )));
            }
            Err(_) => {
                return Err(ExecError::Session(format!(
                    "connecting to {}@{} timed out after {limit:?}",
                    key.user, key.host
                )));
            }
        };

        if !status.success() {
            let detail = tokio::fs::read_to_string(&log).await.unwrap_or_default();
            return Err(ExecError::Session(format!(
                "ssh master for {}@{} exited with {status}: {}",
                key.user,
                key.host,
                detail.trim()
            )));
        }

        info!(host = %key.host, user = %key.user, "ssh control master established");
        Ok(session)
    }
}

impl RemoteTransport for OpenSshTransport {
    fn connect<'a>(
        &'a self,
        key: &'a SessionKey,
    ) -> BoxFuture<'a, Result<Arc<dyn RemoteSession>>> {
        Box::pin(async move {
            let session = self.open_master(key).await?;
            Ok(Arc::new(session) as Arc<dyn RemoteSession>)
        })
    }
}

#[derive(Debug)]
pub struct OpenSshSession {
    ssh_program: PathBuf,
    socket: PathBuf,
    key: SessionKey,
}

impl OpenSshSession {
    fn add_login_args(&self, cmd: &mut Command) {
        cmd.arg("-l").arg(&self.key.user);
        if let Some(port) = self.key.port {
            cmd.arg("-p").arg(port.to_string());
        }
    }

    fn control(&self, operation: &str) -> Command {
        let mut cmd = Command::new(&self.ssh_program);
        cmd.arg("-S")
            .arg(&self.socket)
            .args(["-O", operation]);
        self.add_login_args(&mut cmd);
        cmd.arg(&self.key.host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

impl RemoteSession for OpenSshSession {
    fn probe(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let status = self
                .control("check")
                .status()
                .await
                .map_err(|e| ExecError::Session(format!("running ssh -O check: {e}")))?;
            if status.success() {
                Ok(())
            } else {
                Err(ExecError::Session(format!(
                    "control master for {}@{} is gone ({status})",
                    self.key.user, self.key.host
                )))
            }
        })
    }

    fn command(&self, argv: &[String]) -> Command {
        let mut cmd = Command::new(&self.ssh_program);
        cmd.arg("-S")
            .arg(&self.socket)
            .args(["-o", "BatchMode=yes", "-T"]);
        self.add_login_args(&mut cmd);
        cmd.arg(&self.key.host).arg("--").arg(join_command(argv));
        cmd
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match self.control("stop").status().await {
                Ok(status) => {
                    debug!(host = %self.key.host, user = %self.key.user, %status, "ssh control master stopped")
                }
                Err(e) => {
                    debug!(host = %self.key.host, user = %self.key.user, error = %e, "failed to stop ssh control master")
                }
            }
        })
    }

    fn transport_failure_code(&self) -> Option<i32> {
        Some(SSH_FAILURE_CODE)
    }
}
