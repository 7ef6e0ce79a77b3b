// src/types.rs

use std::fmt;
use std::str::FromStr;

/// Where a command runs, as named in target descriptors and config files.
///
/// - `LocalSameUser`: spawn directly as the console's own user.
/// - `LocalOtherUser`: spawn locally through a run-as-user prefix (`sudo`).
/// - `Container`: spawn through a container-exec prefix (`docker exec`).
/// - `Remote`: run the whole vector over a cached remote shell session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    LocalSameUser,
    LocalOtherUser,
    Container,
    Remote,
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "local" | "local-same-user" => Ok(TargetKind::LocalSameUser),
            "local-user" | "local-other-user" => Ok(TargetKind::LocalOtherUser),
            "container" | "docker" => Ok(TargetKind::Container),
            "remote" | "ssh" => Ok(TargetKind::Remote),
            other => Err(format!(
                "unknown target kind: {other:?} (expected \"local\", \"local-user\", \"container\" or \"remote\")"
            )),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::LocalSameUser => "local",
            TargetKind::LocalOtherUser => "local-user",
            TargetKind::Container => "container",
            TargetKind::Remote => "remote",
        };
        f.write_str(name)
    }
}
