// src/launch/mod.rs

//! Background execution.
//!
//! - [`launcher`] runs executor invocations on a bounded worker pool so the
//!   caller can return immediately and poll the registry afterwards.
//! - [`watchdog`] retires records of long-running operations once they are
//!   observed complete, and sweeps idle records.

pub mod launcher;
pub mod watchdog;

pub use launcher::{AsyncLauncher, LaunchHandle, LaunchLimits};
pub use watchdog::{
    CompletionCheck, MarkerFile, Watchdog, WatchdogConfig, WatchdogExit, spawn_idle_sweeper,
};
