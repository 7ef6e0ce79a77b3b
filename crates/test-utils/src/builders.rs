#![allow(dead_code)]

use std::path::PathBuf;

use execmon::command::{Target, TargetDescriptor};
use execmon::config::{ConfigFile, RawConfigFile};
use execmon::exec::RunRequest;
use execmon::output::OutputOptions;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.config.max_workers = n;
        self
    }

    pub fn max_queued(mut self, n: usize) -> Self {
        self.config.config.max_queued = n;
        self
    }

    pub fn clear_on_reload(mut self, val: bool) -> Self {
        self.config.config.clear_on_reload = val;
        self
    }

    pub fn read_timeout(mut self, duration: &str) -> Self {
        self.config.remote.read_timeout = duration.to_string();
        self
    }

    pub fn record_ttl(mut self, duration: &str) -> Self {
        self.config.watchdog.record_ttl = duration.to_string();
        self
    }

    pub fn with_target(mut self, name: &str, descriptor: TargetDescriptor) -> Self {
        self.config.target.insert(name.to_string(), descriptor);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TargetDescriptor`.
pub struct DescriptorBuilder {
    descriptor: TargetDescriptor,
}

impl DescriptorBuilder {
    pub fn new(kind: &str) -> Self {
        Self {
            descriptor: TargetDescriptor::new(kind),
        }
    }

    pub fn local() -> Self {
        Self::new("local")
    }

    pub fn remote(host: &str, user: &str) -> Self {
        Self::new("remote").host(host).user(user)
    }

    pub fn container(name: &str) -> Self {
        Self::new("container").container_name(name)
    }

    pub fn host(mut self, host: &str) -> Self {
        self.descriptor.host = Some(host.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.descriptor.port = Some(port);
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.descriptor.user = Some(user.to_string());
        self
    }

    pub fn container_name(mut self, name: &str) -> Self {
        self.descriptor.container = Some(name.to_string());
        self
    }

    pub fn credential(mut self, path: impl Into<PathBuf>) -> Self {
        self.descriptor.credential = Some(path.into());
        self
    }

    pub fn build(self) -> TargetDescriptor {
        self.descriptor
    }

    pub fn target(self) -> Target {
        Target::try_from(self.descriptor).expect("descriptor should convert to a target")
    }
}

/// Builder for `RunRequest`.
pub struct RunRequestBuilder {
    id: String,
    command: Vec<String>,
    target: Target,
    options: OutputOptions,
}

impl RunRequestBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            command: Vec::new(),
            target: Target::Local,
            options: OutputOptions::default(),
        }
    }

    /// Run `script` through `sh -c`.
    pub fn shell(mut self, script: &str) -> Self {
        self.command = vec!["sh".into(), "-c".into(), script.into()];
        self
    }

    pub fn argv(mut self, argv: &[&str]) -> Self {
        self.command = argv.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn end_in_newlines(mut self, val: bool) -> Self {
        self.options.end_in_newlines = val;
        self
    }

    pub fn clear_on_reload(mut self, val: bool) -> Self {
        self.options.clear_on_reload = val;
        self
    }

    pub fn build(self) -> RunRequest {
        RunRequest::new(self.id, self.command, self.target).with_options(self.options)
    }
}
