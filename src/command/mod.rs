// src/command/mod.rs

//! Command vectors and the targets they run on.
//!
//! - [`target`] turns loosely-typed target descriptors (as handed over by the
//!   persistence layer or read from config) into validated [`Target`]s.
//! - [`builder`] prepends the privilege-escalation prefix a target needs.

pub mod builder;
pub mod target;

pub use builder::{CommandBuilder, EscalationConfig, build_command};
pub use target::{RemoteTarget, Target, TargetDescriptor};
