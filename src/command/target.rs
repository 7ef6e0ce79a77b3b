// src/command/target.rs

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::errors::{ExecError, Result};
use crate::types::TargetKind;

static USER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]{0,31}$").expect("user name pattern is valid")
});

static CONTAINER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,127}$").expect("container name pattern is valid")
});

static HOST_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_\[][A-Za-z0-9_.:\[\]-]{0,252}$").expect("host name pattern is valid")
});

/// Target description as received from collaborators.
///
/// Every field except `kind` is optional here; which ones are required
/// depends on the kind and is checked by [`Target::try_from`].
///
/// ```toml
/// [target.survival]
/// kind = "remote"
/// host = "10.0.0.5"
/// user = "mcserver"
/// credential = "/home/console/.ssh/id_ed25519"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TargetDescriptor {
    pub kind: String,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Run-as user (local-user), container user, or remote login user.
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub container: Option<String>,

    /// Private key file used for remote sessions.
    #[serde(default)]
    pub credential: Option<PathBuf>,
}

impl TargetDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }
}

/// Connection details of a remote target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteTarget {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub credential: Option<PathBuf>,
}

/// Validated target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Local,
    LocalAs { user: String },
    Container { container: String, user: Option<String> },
    Remote(RemoteTarget),
}

impl Target {
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Local => TargetKind::LocalSameUser,
            Target::LocalAs { .. } => TargetKind::LocalOtherUser,
            Target::Container { .. } => TargetKind::Container,
            Target::Remote(_) => TargetKind::Remote,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Target::Remote(_))
    }
}

impl TryFrom<&TargetDescriptor> for Target {
    type Error = ExecError;

    fn try_from(desc: &TargetDescriptor) -> Result<Self> {
        let kind: TargetKind = desc.kind.parse().map_err(ExecError::Configuration)?;

        match kind {
            TargetKind::LocalSameUser => Ok(Target::Local),
            TargetKind::LocalOtherUser => {
                let user = required(&desc.user, kind, "user")?;
                Ok(Target::LocalAs {
                    user: checked(user, &USER_NAME, "user")?,
                })
            }
            TargetKind::Container => {
                let container = required(&desc.container, kind, "container")?;
                let user = desc
                    .user
                    .as_deref()
                    .map(|u| checked(u, &USER_NAME, "user"))
                    .transpose()?;
                Ok(Target::Container {
                    container: checked(container, &CONTAINER_NAME, "container")?,
                    user,
                })
            }
            TargetKind::Remote => {
                let host = required(&desc.host, kind, "host")?;
                let user = required(&desc.user, kind, "user")?;
                if desc.port == Some(0) {
                    return Err(ExecError::config("remote target port must be non-zero"));
                }
                Ok(Target::Remote(RemoteTarget {
                    host: checked(host, &HOST_NAME, "host")?,
                    port: desc.port,
                    user: checked(user, &USER_NAME, "user")?,
                    credential: desc.credential.clone(),
                }))
            }
        }
    }
}

impl TryFrom<TargetDescriptor> for Target {
    type Error = ExecError;

    fn try_from(desc: TargetDescriptor) -> Result<Self> {
        Target::try_from(&desc)
    }
}

fn required<'a>(value: &'a Option<String>, kind: TargetKind, field: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| ExecError::config(format!("target kind \"{kind}\" requires `{field}`")))
}

fn checked(value: &str, pattern: &Regex, field: &str) -> Result<String> {
    if pattern.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(ExecError::config(format!("invalid {field} in target: {value:?}")))
    }
}
