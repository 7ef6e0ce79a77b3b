// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::command::{EscalationConfig, Target, TargetDescriptor};
use crate::config::validate::validate_raw;
use crate::errors::{ExecError, Result};
use crate::exec::remote::{DEFAULT_READ_TIMEOUT, OpenSshConfig, PoolConfig};
use crate::launch::{LaunchLimits, WatchdogConfig};
use crate::output::OutputOptions;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// max_workers = 16
/// clear_on_reload = true
///
/// [remote]
/// read_timeout = "5s"
///
/// [target.vps]
/// kind = "remote"
/// host = "10.0.0.5"
/// user = "gameserver"
/// ```
///
/// All sections are optional. Durations stay strings here and are parsed
/// when converting into [`ConfigFile`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: RawGeneralSection,

    #[serde(default)]
    pub remote: RawRemoteSection,

    #[serde(default)]
    pub escalation: EscalationConfig,

    #[serde(default)]
    pub watchdog: RawWatchdogSection,

    /// Named targets from `[target.<name>]`.
    #[serde(default)]
    pub target: BTreeMap<String, TargetDescriptor>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGeneralSection {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_max_queued")]
    pub max_queued: usize,

    /// Whether a new run on an existing record clears its previous output.
    #[serde(default = "default_true")]
    pub clear_on_reload: bool,

    #[serde(default)]
    pub end_in_newlines: bool,
}

fn default_max_workers() -> usize {
    16
}

fn default_max_queued() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for RawGeneralSection {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_queued: default_max_queued(),
            clear_on_reload: true,
            end_in_newlines: false,
        }
    }
}

/// `[remote]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRemoteSection {
    #[serde(default = "default_five_seconds")]
    pub read_timeout: String,

    #[serde(default = "default_five_seconds")]
    pub probe_timeout: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,

    #[serde(default = "default_session_cache_size")]
    pub session_cache_size: usize,

    #[serde(default = "default_ssh_program")]
    pub ssh_program: PathBuf,

    /// Directory for control sockets; defaults to a per-user temp dir.
    #[serde(default)]
    pub control_dir: Option<PathBuf>,
}

fn default_five_seconds() -> String {
    "5s".to_string()
}

fn default_connect_timeout() -> String {
    "10s".to_string()
}

fn default_session_cache_size() -> usize {
    8
}

fn default_ssh_program() -> PathBuf {
    PathBuf::from("ssh")
}

impl Default for RawRemoteSection {
    fn default() -> Self {
        Self {
            read_timeout: default_five_seconds(),
            probe_timeout: default_five_seconds(),
            connect_timeout: default_connect_timeout(),
            session_cache_size: default_session_cache_size(),
            ssh_program: default_ssh_program(),
            control_dir: None,
        }
    }
}

/// `[watchdog]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWatchdogSection {
    #[serde(default = "default_five_seconds")]
    pub interval: String,

    #[serde(default = "default_one_hour")]
    pub max_lifetime: String,

    /// Idle records older than this are swept. At most one hour.
    #[serde(default = "default_one_hour")]
    pub record_ttl: String,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: String,
}

fn default_one_hour() -> String {
    "1h".to_string()
}

fn default_sweep_interval() -> String {
    "5m".to_string()
}

impl Default for RawWatchdogSection {
    fn default() -> Self {
        Self {
            interval: default_five_seconds(),
            max_lifetime: default_one_hour(),
            record_ttl: default_one_hour(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

/// Validated remote settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub read_timeout: Duration,
    pub pool: PoolConfig,
    pub ssh: OpenSshConfig,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            pool: PoolConfig::default(),
            ssh: OpenSshConfig::default(),
        }
    }
}

/// Validated watchdog and sweeper settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogSettings {
    pub check: WatchdogConfig,
    pub record_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            check: WatchdogConfig::default(),
            record_ttl: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Validated configuration, ready to build executors and launchers from.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub limits: LaunchLimits,
    pub output: OutputOptions,
    pub remote: RemoteSettings,
    pub escalation: EscalationConfig,
    pub watchdog: WatchdogSettings,
    pub targets: BTreeMap<String, Target>,
}

impl ConfigFile {
    /// Look up a named `[target.<name>]` entry.
    pub fn target(&self, name: &str) -> Result<&Target> {
        self.targets
            .get(name)
            .ok_or_else(|| ExecError::config(format!("unknown target '{name}'")))
    }
}

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ExecError;

    fn try_from(raw: RawConfigFile) -> Result<Self> {
        validate_raw(&raw)?;

        let remote = RemoteSettings {
            read_timeout: parse_field("remote.read_timeout", &raw.remote.read_timeout)?,
            pool: PoolConfig {
                capacity: raw.remote.session_cache_size,
                probe_timeout: parse_field("remote.probe_timeout", &raw.remote.probe_timeout)?,
            },
            ssh: OpenSshConfig {
                ssh_program: raw.remote.ssh_program.clone(),
                control_dir: raw
                    .remote
                    .control_dir
                    .clone()
                    .unwrap_or_else(|| OpenSshConfig::default().control_dir),
                connect_timeout: parse_field(
                    "remote.connect_timeout",
                    &raw.remote.connect_timeout,
                )?,
            },
        };

        let watchdog = WatchdogSettings {
            check: WatchdogConfig {
                interval: parse_field("watchdog.interval", &raw.watchdog.interval)?,
                max_lifetime: parse_field("watchdog.max_lifetime", &raw.watchdog.max_lifetime)?,
            },
            record_ttl: parse_field("watchdog.record_ttl", &raw.watchdog.record_ttl)?,
            sweep_interval: parse_field("watchdog.sweep_interval", &raw.watchdog.sweep_interval)?,
        };
        if watchdog.record_ttl > MAX_RECORD_TTL {
            return Err(ExecError::config(format!(
                "[watchdog].record_ttl must be at most 1h (got {:?})",
                watchdog.record_ttl
            )));
        }

        let targets = raw
            .target
            .iter()
            .map(|(name, descriptor)| {
                Target::try_from(descriptor)
                    .map(|target| (name.clone(), target))
                    .map_err(|e| ExecError::config(format!("[target.{name}]: {e}")))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(ConfigFile {
            limits: LaunchLimits {
                max_workers: raw.config.max_workers,
                max_queued: raw.config.max_queued,
            },
            output: OutputOptions {
                end_in_newlines: raw.config.end_in_newlines,
                clear_on_reload: raw.config.clear_on_reload,
            },
            remote,
            escalation: raw.escalation,
            watchdog,
            targets,
        })
    }
}

/// Upper bound for `[watchdog].record_ttl`.
pub const MAX_RECORD_TTL: Duration = Duration::from_secs(60 * 60);

fn parse_field(field: &str, value: &str) -> Result<Duration> {
    let duration = parse_duration(value)
        .map_err(|e| ExecError::config(format!("[{field}]: {e}")))?;
    if duration.is_zero() {
        return Err(ExecError::config(format!("[{field}] must be non-zero")));
    }
    Ok(duration)
}

/// Parse a duration like `"250ms"`, `"3s"`, `"1m"` or `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    let secs_per_unit = match unit_part.trim().to_lowercase().as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        other => return Err(format!("unknown duration unit '{other}'")),
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
