// src/command/builder.rs

//! Privilege-escalation prefixes.
//!
//! The builder never runs anything. It only prepends at most one prefix to
//! the base command, so callers (cron manager, sudoers manager, route
//! handlers) can be tested without a live system.

use serde::Deserialize;

use crate::command::target::{Target, TargetDescriptor};
use crate::errors::{ExecError, Result};

/// Prefix programs used for run-as-user and container execution.
///
/// Mirrors the `[escalation]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EscalationConfig {
    /// Run-as-user prefix; `-u <user>` is appended.
    #[serde(default = "default_sudo")]
    pub sudo: Vec<String>,

    /// Container-exec prefix; `[--user <user>] <container>` is appended.
    #[serde(default = "default_container_exec")]
    pub container_exec: Vec<String>,

    /// Optional privileged helper used to cancel a process tree; the pid is
    /// appended as its last argument.
    #[serde(default)]
    pub kill_helper: Option<Vec<String>>,
}

fn default_sudo() -> Vec<String> {
    vec!["sudo".into(), "-n".into()]
}

fn default_container_exec() -> Vec<String> {
    vec!["docker".into(), "exec".into()]
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            sudo: default_sudo(),
            container_exec: default_container_exec(),
            kill_helper: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    escalation: EscalationConfig,
}

impl CommandBuilder {
    pub fn new(escalation: EscalationConfig) -> Self {
        Self { escalation }
    }

    pub fn escalation(&self) -> &EscalationConfig {
        &self.escalation
    }

    /// Build the final command vector for a raw target descriptor.
    ///
    /// Unknown target kinds and incomplete descriptors fail with
    /// [`ExecError::Configuration`].
    pub fn build(&self, base: &[String], target: &TargetDescriptor) -> Result<Vec<String>> {
        let target = Target::try_from(target)?;
        self.build_for(base, &target)
    }

    /// Build the final command vector for an already validated target.
    ///
    /// Remote targets come back unchanged: the remote executor ships the
    /// whole vector over the session instead of prefixing it locally.
    pub fn build_for(&self, base: &[String], target: &Target) -> Result<Vec<String>> {
        if base.is_empty() {
            return Err(ExecError::config("cannot build an empty command"));
        }

        let prefix: Vec<String> = match target {
            Target::Local | Target::Remote(_) => Vec::new(),
            Target::LocalAs { user } => {
                let mut prefix = non_empty(&self.escalation.sudo, "sudo")?.to_vec();
                prefix.extend(["-u".to_string(), user.clone()]);
                prefix
            }
            Target::Container { container, user } => {
                let mut prefix =
                    non_empty(&self.escalation.container_exec, "container_exec")?.to_vec();
                if let Some(user) = user {
                    prefix.extend(["--user".to_string(), user.clone()]);
                }
                prefix.push(container.clone());
                prefix
            }
        };

        let mut command = prefix;
        command.extend(base.iter().cloned());
        Ok(command)
    }
}

/// Build with the default escalation prefixes.
pub fn build_command(base: &[String], target: &TargetDescriptor) -> Result<Vec<String>> {
    CommandBuilder::default().build(base, target)
}

fn non_empty<'a>(prefix: &'a [String], name: &str) -> Result<&'a [String]> {
    if prefix.is_empty() {
        Err(ExecError::config(format!("escalation prefix `{name}` is empty")))
    } else {
        Ok(prefix)
    }
}
