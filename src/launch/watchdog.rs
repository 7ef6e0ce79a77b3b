// src/launch/watchdog.rs

//! Record retirement for long-running operations.
//!
//! A [`Watchdog`] polls a [`CompletionCheck`] for one record and removes the
//! record from the registry once the operation is observed complete, or once
//! its maximum lifetime has passed. Operations that outlive their launching
//! command (a server start that forks and returns, a backup that signals
//! completion through a marker file) rely on this to get cleaned up.

use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::record::ProcessRegistry;

/// Observes whether a long-running operation is done.
pub trait CompletionCheck: Send + Sync + 'static {
    fn is_complete(&self) -> bool;
}

impl<F> CompletionCheck for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn is_complete(&self) -> bool {
        self()
    }
}

/// Complete once the file exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerFile(pub PathBuf);

impl CompletionCheck for MarkerFile {
    fn is_complete(&self) -> bool {
        self.0.exists()
    }
}

/// The `[watchdog]` polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    pub interval: Duration,
    pub max_lifetime: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_lifetime: Duration::from_secs(60 * 60),
        }
    }
}

/// Why a watchdog stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogExit {
    /// The check reported completion; the record was removed.
    Completed,
    /// `max_lifetime` elapsed first; the record was removed anyway.
    Expired,
    /// Cancelled through its token; the record is left alone.
    Cancelled,
}

/// A running watchdog task.
#[derive(Debug)]
pub struct Watchdog {
    id: String,
    token: CancellationToken,
    join: JoinHandle<WatchdogExit>,
}

impl Watchdog {
    /// Start watching record `id` in `registry`.
    pub fn spawn<C>(
        registry: ProcessRegistry,
        id: impl Into<String>,
        check: C,
        config: WatchdogConfig,
    ) -> Self
    where
        C: CompletionCheck,
    {
        Self::spawn_with_token(registry, id, check, config, CancellationToken::new())
    }

    /// Like [`Watchdog::spawn`], stopping when `token` is cancelled.
    ///
    /// Pass a child of a shutdown token to stop all watchdogs at once.
    pub fn spawn_with_token<C>(
        registry: ProcessRegistry,
        id: impl Into<String>,
        check: C,
        config: WatchdogConfig,
        token: CancellationToken,
    ) -> Self
    where
        C: CompletionCheck,
    {
        let id = id.into();
        let task_id = id.clone();
        let task_token = token.clone();
        let join = tokio::spawn(async move {
            watch(registry, task_id, check, config, task_token).await
        });
        Self { id, token, join }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop polling; the record stays in the registry.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the watchdog to stop. A panicked or aborted task counts as
    /// cancelled.
    pub async fn join(self) -> WatchdogExit {
        self.join.await.unwrap_or(WatchdogExit::Cancelled)
    }
}

async fn watch<C>(
    registry: ProcessRegistry,
    id: String,
    check: C,
    config: WatchdogConfig,
    token: CancellationToken,
) -> WatchdogExit
where
    C: CompletionCheck,
{
    // `sleep` saturates lifetimes too large to add to the current instant.
    let expiry = tokio::time::sleep(config.max_lifetime);
    tokio::pin!(expiry);
    let mut ticker = tokio::time::interval(config.interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(record = %id, interval = ?config.interval, max_lifetime = ?config.max_lifetime, "watchdog started");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(record = %id, "watchdog cancelled");
                return WatchdogExit::Cancelled;
            }
            _ = &mut expiry => {
                registry.remove(&id);
                info!(record = %id, max_lifetime = ?config.max_lifetime, "operation outlived its lifetime; record retired");
                return WatchdogExit::Expired;
            }
            _ = ticker.tick() => {
                if check.is_complete() {
                    registry.remove(&id);
                    info!(record = %id, "operation complete; record retired");
                    return WatchdogExit::Completed;
                }
            }
        }
    }
}

/// Periodically drop records idle for longer than `ttl`.
///
/// Running records are never swept. Runs until `token` is cancelled.
pub fn spawn_idle_sweeper(
    registry: ProcessRegistry,
    ttl: Duration,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let swept = registry.sweep_idle(ttl);
                    if !swept.is_empty() {
                        info!(count = swept.len(), ids = ?swept, "swept idle records");
                    }
                }
            }
        }
        debug!("idle sweeper stopped");
    })
}
