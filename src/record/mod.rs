// src/record/mod.rs

//! Process records: the accumulated output and status of one command run.
//!
//! A [`ProcessRecord`] is written by exactly one executor at a time and read
//! by any number of pollers. It always lives behind a [`RecordHandle`]
//! (`Arc<Mutex<..>>`), and the [`ProcessRegistry`] maps caller-chosen ids to
//! those handles.
//!
//! Lifecycle of a record:
//!
//! ```text
//! (absent) -> Created -> Running -> Finished
//!                           ^           |
//!                           +-----------+   new run (begin_run)
//! Finished -> (absent)                      removal / watchdog / sweeper
//! ```

pub mod registry;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::trace;

use crate::errors::{ExecError, Result};
use crate::output::OutputStream;

pub use registry::ProcessRegistry;

/// Local process could not be created (missing binary, permission denied).
pub const EXIT_SPAWN_FAILED: i32 = -1;
/// Remote session could not be established or died mid-command.
pub const EXIT_SESSION_FAILED: i32 = -2;
/// Remote read exceeded the configured timeout.
pub const EXIT_TIMED_OUT: i32 = -3;
/// Local process was spawned but could not be waited on.
pub const EXIT_LOST: i32 = -4;

/// Typed view of a settled exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The command ran and exited with this code (`128 + signal` for
    /// signal deaths).
    Exited(i32),
    SpawnFailed,
    SessionFailed,
    TimedOut,
    Lost,
}

impl Termination {
    pub fn code(self) -> i32 {
        match self {
            Termination::Exited(code) => code,
            Termination::SpawnFailed => EXIT_SPAWN_FAILED,
            Termination::SessionFailed => EXIT_SESSION_FAILED,
            Termination::TimedOut => EXIT_TIMED_OUT,
            Termination::Lost => EXIT_LOST,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            EXIT_SPAWN_FAILED => Termination::SpawnFailed,
            EXIT_SESSION_FAILED => Termination::SessionFailed,
            EXIT_TIMED_OUT => Termination::TimedOut,
            EXIT_LOST => Termination::Lost,
            other => Termination::Exited(other),
        }
    }

    pub fn success(self) -> bool {
        matches!(self, Termination::Exited(0))
    }

    /// Whether running the same command again could plausibly succeed.
    ///
    /// Session failures and timeouts depend on the network and the remote
    /// host; spawn failures and real exit codes do not change on retry.
    pub fn is_retryable(self) -> bool {
        matches!(self, Termination::SessionFailed | Termination::TimedOut)
    }
}

/// Derived lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Created,
    Running,
    Finished,
}

/// Mutable record holding a command's accumulated output and status.
#[derive(Debug)]
pub struct ProcessRecord {
    stdout: Vec<String>,
    stderr: Vec<String>,
    running: bool,
    /// A background launch is waiting for a worker to start on this record.
    queued: bool,
    pid: Option<u32>,
    exit_status: Option<i32>,
    touched: Instant,
}

impl Default for ProcessRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRecord {
    pub fn new() -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            running: false,
            queued: false,
            pid: None,
            exit_status: None,
            touched: Instant::now(),
        }
    }

    pub fn stdout(&self) -> &[String] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[String] {
        &self.stderr
    }

    /// True while a command is actively writing to this record.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    pub fn termination(&self) -> Option<Termination> {
        self.exit_status.map(Termination::from_code)
    }

    pub fn state(&self) -> RecordState {
        match (self.running, self.exit_status) {
            (true, _) => RecordState::Running,
            (false, Some(_)) => RecordState::Finished,
            (false, None) => RecordState::Created,
        }
    }

    /// Time since the record was last mutated.
    pub fn idle_for(&self) -> Duration {
        self.touched.elapsed()
    }

    /// Start a new run on this record.
    ///
    /// Fails with [`ExecError::RecordBusy`] if a run is already active; the
    /// record is left untouched in that case.
    pub fn begin_run(&mut self, id: &str, clear: bool) -> Result<()> {
        if self.running {
            return Err(ExecError::RecordBusy(id.to_string()));
        }
        if clear {
            self.stdout.clear();
            self.stderr.clear();
        }
        self.running = true;
        self.queued = false;
        self.pid = None;
        self.exit_status = None;
        self.touched = Instant::now();
        Ok(())
    }

    pub(crate) fn set_queued(&mut self, queued: bool) {
        self.queued = queued;
    }

    pub fn set_pid(&mut self, pid: Option<u32>) {
        self.pid = pid;
        self.touched = Instant::now();
    }

    /// Append lines to one of the streams.
    ///
    /// Lines arriving after [`finish`](Self::finish) are dropped: a settled
    /// record never grows.
    pub fn append<I>(&mut self, stream: OutputStream, lines: I)
    where
        I: IntoIterator<Item = String>,
    {
        if !self.running {
            trace!(?stream, "dropping output for a record that is not running");
            return;
        }
        let buf = match stream {
            OutputStream::Stdout => &mut self.stdout,
            OutputStream::Stderr => &mut self.stderr,
        };
        buf.extend(lines);
        self.touched = Instant::now();
    }

    /// Settle the run: record the exit status and release the record.
    pub fn finish(&mut self, termination: Termination) {
        self.exit_status = Some(termination.code());
        self.running = false;
        self.touched = Instant::now();
    }

    pub fn snapshot(&self) -> RecordSnapshot {
        RecordSnapshot {
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            pid: self.pid,
            exit_status: self.exit_status,
            in_progress: self.running,
        }
    }
}

/// Plain-data copy of a record, as handed to pollers and front ends.
///
/// `in_progress` is the exposed name of the record's running flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSnapshot {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub pid: Option<u32>,
    pub exit_status: Option<i32>,
    pub in_progress: bool,
}

impl RecordSnapshot {
    pub fn termination(&self) -> Option<Termination> {
        self.exit_status.map(Termination::from_code)
    }

    pub fn is_settled(&self) -> bool {
        !self.in_progress && self.exit_status.is_some()
    }
}

/// Shared handle to a [`ProcessRecord`].
///
/// Cloning the handle shares the record; every access goes through the
/// record's mutex.
#[derive(Debug, Clone, Default)]
pub struct RecordHandle {
    inner: Arc<Mutex<ProcessRecord>>,
}

impl RecordHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the record.
    pub fn with<R>(&self, f: impl FnOnce(&mut ProcessRecord) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    pub fn snapshot(&self) -> RecordSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn state(&self) -> RecordState {
        self.inner.lock().state()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().is_running()
    }

    pub fn is_queued(&self) -> bool {
        self.inner.lock().is_queued()
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.lock().pid()
    }

    pub fn exit_status(&self) -> Option<i32> {
        self.inner.lock().exit_status()
    }

    pub(crate) fn begin_run(&self, id: &str, clear: bool) -> Result<()> {
        self.inner.lock().begin_run(id, clear)
    }

    pub(crate) fn set_pid(&self, pid: Option<u32>) {
        self.inner.lock().set_pid(pid);
    }

    pub(crate) fn set_queued(&self, queued: bool) {
        self.inner.lock().set_queued(queued);
    }

    pub(crate) fn append(&self, stream: OutputStream, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        self.inner.lock().append(stream, lines);
    }

    /// Append a diagnostic line to stderr and settle the run in one step.
    pub(crate) fn fail(&self, termination: Termination, diagnostic: impl fmt::Display) {
        let mut guard = self.inner.lock();
        guard.append(OutputStream::Stderr, [format!("execmon: {diagnostic}\n")]);
        guard.finish(termination);
    }

    pub(crate) fn finish(&self, termination: Termination) {
        self.inner.lock().finish(termination);
    }

    /// Whether both handles point at the same record.
    pub fn ptr_eq(&self, other: &RecordHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
