// src/output/mod.rs

//! Turning raw process output into record lines.
//!
//! - [`assembler`] holds the line reconstruction algorithm and the
//!   per-stream [`LineAssembler`] state (partial lines, split UTF-8).

pub mod assembler;

use serde::Deserialize;

pub use assembler::{LineAssembler, split_lines};

/// Which output stream a chunk or line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Per-run output handling options.
///
/// Both options are part of every run request; nothing here is read from
/// ambient configuration at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OutputOptions {
    /// Append `\n` to every emitted line that does not already end with one.
    #[serde(default)]
    pub end_in_newlines: bool,

    /// Clear both buffers when a new run starts on an existing record.
    /// When false, a new run keeps appending to the previous run's output.
    #[serde(default = "default_clear_on_reload")]
    pub clear_on_reload: bool,
}

fn default_clear_on_reload() -> bool {
    true
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            end_in_newlines: false,
            clear_on_reload: default_clear_on_reload(),
        }
    }
}
