// src/exec/remote/transport.rs

//! Pluggable remote transport abstraction.
//!
//! The remote executor talks to a [`RemoteTransport`] instead of a concrete
//! SSH implementation. Production uses
//! [`OpenSshTransport`](super::openssh::OpenSshTransport); tests can provide
//! their own transport that runs channels locally.
//!
//! A channel is just a `tokio::process::Command` whose stdout and stderr are
//! the remote command's streams, so both executors share one drain loop.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::process::Command;

use crate::command::RemoteTarget;
use crate::errors::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sessions are cached per (host, port, user, credential).
pub type SessionKey = RemoteTarget;

/// Opens sessions to remote hosts.
pub trait RemoteTransport: Send + Sync + fmt::Debug {
    /// Establish a new session. Failures are
    /// [`ExecError::Session`](crate::errors::ExecError::Session).
    fn connect<'a>(&'a self, key: &'a SessionKey)
    -> BoxFuture<'a, Result<Arc<dyn RemoteSession>>>;
}

/// An established, reusable remote session.
pub trait RemoteSession: Send + Sync + fmt::Debug {
    /// Cheap liveness check run before a cached session is reused.
    fn probe(&self) -> BoxFuture<'_, Result<()>>;

    /// Build the command that runs `argv` over this session.
    ///
    /// The caller configures stdio and spawns it.
    fn command(&self, argv: &[String]) -> Command;

    /// Release the session. In-flight commands are allowed to finish.
    fn close(&self) -> BoxFuture<'_, ()>;

    /// Exit code the channel reports when the transport itself failed rather
    /// than the remote command (255 for OpenSSH).
    fn transport_failure_code(&self) -> Option<i32> {
        None
    }
}

/// Quote one argument for a POSIX shell.
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:@,+%".contains(&b));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Join an argument vector into one shell command line, quoting as needed.
///
/// Remote shells re-parse the command line, so every element must survive
/// word splitting and expansion unchanged.
pub fn join_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}
