// src/launch/launcher.rs

//! Bounded worker pool for command runs.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::{ExecError, Result};
use crate::exec::{Executors, RunRequest};
use crate::launch::watchdog::{CompletionCheck, Watchdog, WatchdogConfig};
use crate::record::{ProcessRegistry, RecordHandle, Termination};

/// Worker pool limits (the `[config]` section).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchLimits {
    /// Commands executing at the same time.
    pub max_workers: usize,
    /// Admitted launches allowed to wait for a worker.
    pub max_queued: usize,
}

impl Default for LaunchLimits {
    fn default() -> Self {
        Self {
            max_workers: 16,
            max_queued: 64,
        }
    }
}

#[derive(Debug, Default)]
struct Admissions {
    /// Ids with an admitted run (queued, running, or in-place).
    ids: HashSet<String>,
    /// Background launches queued or running.
    background: usize,
}

/// Releases an admission when the run is over (or was never started).
#[derive(Debug)]
struct Admission {
    id: String,
    background: bool,
    admissions: Arc<Mutex<Admissions>>,
    /// Record marked queued on behalf of this admission.
    queued: Option<RecordHandle>,
}

impl Drop for Admission {
    fn drop(&mut self) {
        if let Some(record) = self.queued.take() {
            record.set_queued(false);
        }
        let mut admissions = self.admissions.lock();
        admissions.ids.remove(&self.id);
        if self.background {
            admissions.background -= 1;
        }
    }
}

/// Handle to a background run.
#[derive(Debug)]
pub struct LaunchHandle {
    id: String,
    join: JoinHandle<Result<Termination>>,
}

impl LaunchHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run to settle.
    ///
    /// Pollers don't need this; the record carries the same result.
    pub async fn wait(self) -> Result<Termination> {
        self.join
            .await
            .map_err(|e| ExecError::Other(anyhow!("launch task for {} failed: {e}", self.id)))?
    }
}

/// Runs commands in the background on a bounded pool.
///
/// At most `max_workers` commands execute at once; up to `max_queued` more
/// wait for a worker. Anything beyond that is rejected with
/// [`ExecError::LaunchRejected`] instead of piling up. Only one run per
/// record id may be admitted at a time ([`ExecError::RecordBusy`]).
#[derive(Debug, Clone)]
pub struct AsyncLauncher {
    registry: ProcessRegistry,
    executors: Executors,
    limits: LaunchLimits,
    workers: Arc<Semaphore>,
    admissions: Arc<Mutex<Admissions>>,
}

impl AsyncLauncher {
    pub fn new(registry: ProcessRegistry, executors: Executors, limits: LaunchLimits) -> Self {
        let limits = LaunchLimits {
            max_workers: limits.max_workers.max(1),
            ..limits
        };
        Self {
            registry,
            executors,
            limits,
            workers: Arc::new(Semaphore::new(limits.max_workers)),
            admissions: Arc::new(Mutex::new(Admissions::default())),
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn executors(&self) -> &Executors {
        &self.executors
    }

    pub fn limits(&self) -> LaunchLimits {
        self.limits
    }

    /// Background launches currently queued or running.
    pub fn in_flight(&self) -> usize {
        self.admissions.lock().background
    }

    /// Start `request` in the background and return immediately.
    ///
    /// The record is created up front, so pollers can look it up by id as
    /// soon as this returns.
    pub fn launch(&self, request: RunRequest) -> Result<LaunchHandle> {
        let mut admission = self.admit(&request.id, true)?;
        let record = self.registry.reserve(&request.id);
        admission.queued = Some(record.clone());
        if record.is_running() {
            return Err(ExecError::RecordBusy(request.id));
        }

        let executor = self.executors.select(&request.target);
        let workers = Arc::clone(&self.workers);
        let id = request.id.clone();

        let join = tokio::spawn(async move {
            let _admission = admission;
            let _permit = workers.acquire_owned().await.map_err(|_| {
                ExecError::LaunchRejected(format!("worker pool closed before {} started", request.id))
            })?;
            debug!(record = %request.id, "worker picked up launch");
            executor.run(&request, &record).await
        });

        debug!(record = %id, "launch admitted");
        Ok(LaunchHandle { id, join })
    }

    /// Run `request` in place on the caller's task.
    ///
    /// This bypasses the worker pool but still refuses to start a second run
    /// on a busy record.
    pub async fn run(&self, request: RunRequest) -> Result<Termination> {
        let _admission = self.admit(&request.id, false)?;
        let record = self.registry.get_or_create(&request.id);
        self.executors
            .select(&request.target)
            .run(&request, &record)
            .await
    }

    /// Launch a long-running operation together with a watchdog that retires
    /// its record once `check` reports completion.
    pub fn launch_with_watchdog<C>(
        &self,
        request: RunRequest,
        check: C,
        config: WatchdogConfig,
    ) -> Result<(LaunchHandle, Watchdog)>
    where
        C: CompletionCheck,
    {
        let id = request.id.clone();
        let handle = self.launch(request)?;
        let watchdog = Watchdog::spawn(self.registry.clone(), id, check, config);
        Ok((handle, watchdog))
    }

    fn admit(&self, id: &str, background: bool) -> Result<Admission> {
        let mut admissions = self.admissions.lock();
        if admissions.ids.contains(id) {
            return Err(ExecError::RecordBusy(id.to_string()));
        }
        if background {
            let capacity = self.limits.max_workers + self.limits.max_queued;
            if admissions.background >= capacity {
                warn!(record = %id, capacity, "launch rejected; worker pool and queue are full");
                return Err(ExecError::LaunchRejected(format!(
                    "{capacity} launches already queued or running"
                )));
            }
            admissions.background += 1;
        }
        admissions.ids.insert(id.to_string());

        Ok(Admission {
            id: id.to_string(),
            background,
            admissions: Arc::clone(&self.admissions),
            queued: None,
        })
    }
}
