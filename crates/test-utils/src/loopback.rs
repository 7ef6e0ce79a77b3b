use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use execmon::command::RemoteTarget;
use execmon::errors::{ExecError, Result};
use execmon::exec::remote::transport::BoxFuture;
use execmon::exec::remote::{RemoteSession, RemoteTransport, SessionKey, join_command};
use tokio::process::Command;

#[derive(Debug, Default)]
struct LoopbackState {
    connects: AtomicUsize,
    probes: AtomicUsize,
    closes: AtomicUsize,
    fail_connect: AtomicBool,
    fail_probe: AtomicBool,
    fail_channels: AtomicBool,
    failure_code: Mutex<Option<i32>>,
}

/// A `RemoteTransport` whose "remote" shell is the local `sh`.
///
/// Channels run `sh -c '<joined argv>'`, so commands see the same quoting a
/// real remote shell would. Connect, probe and channel failures can be
/// switched on at any time; every call is counted.
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport {
    state: Arc<LoopbackState>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_probe(&self, fail: bool) {
        self.state.fail_probe.store(fail, Ordering::SeqCst);
    }

    /// Make new channels fail to start, as if the session died under them.
    pub fn fail_channels(&self, fail: bool) {
        self.state.fail_channels.store(fail, Ordering::SeqCst);
    }

    /// Exit code sessions report for a broken transport (OpenSSH uses 255).
    pub fn transport_failure_code(&self, code: Option<i32>) {
        *self
            .state
            .failure_code
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = code;
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.state.probes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

impl RemoteTransport for LoopbackTransport {
    fn connect<'a>(
        &'a self,
        key: &'a SessionKey,
    ) -> BoxFuture<'a, Result<Arc<dyn RemoteSession>>> {
        Box::pin(async move {
            let serial = self.state.connects.fetch_add(1, Ordering::SeqCst);
            if self.state.fail_connect.load(Ordering::SeqCst) {
                return Err(ExecError::Session(format!(
                    "loopback connect to {}@{} refused",
                    key.user, key.host
                )));
            }
            let session: Arc<dyn RemoteSession> = Arc::new(LoopbackSession {
                key: key.clone(),
                serial,
                state: Arc::clone(&self.state),
            });
            Ok(session)
        })
    }
}

/// One loopback session; `serial` is the connect count when it was opened.
#[derive(Debug)]
pub struct LoopbackSession {
    pub key: RemoteTarget,
    pub serial: usize,
    state: Arc<LoopbackState>,
}

impl RemoteSession for LoopbackSession {
    fn probe(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.state.probes.fetch_add(1, Ordering::SeqCst);
            if self.state.fail_probe.load(Ordering::SeqCst) {
                return Err(ExecError::Session(format!(
                    "loopback session {} is gone",
                    self.serial
                )));
            }
            Ok(())
        })
    }

    fn command(&self, argv: &[String]) -> Command {
        let shell = if self.state.fail_channels.load(Ordering::SeqCst) {
            "/nonexistent/loopback-shell"
        } else {
            "sh"
        };
        let mut cmd = Command::new(shell);
        cmd.arg("-c").arg(join_command(argv));
        cmd
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn transport_failure_code(&self) -> Option<i32> {
        *self
            .state
            .failure_code
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
