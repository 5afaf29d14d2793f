//! Typed builder for Go compiler and linker invocations.
//!
//! Wraps `std::process::Command` with methods for the handful of flags the
//! builder passes. The tool's stdout and stderr are inherited so diagnostics
//! reach the caller unmodified.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::verbose::{Timer, vprintln};

/// A Go toolchain binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Compile,
    Link,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Link => "link",
        }
    }
}

/// A typed builder for one tool invocation.
pub struct ToolCommand {
    cmd: Command,
    tool: Tool,
    path: PathBuf,
    inputs_started: bool,
}

impl ToolCommand {
    /// Prepare an invocation of `tool`, targeting the configured platform.
    pub fn new(config: &BuildConfig, tool: Tool) -> Result<Self, BuildError> {
        let path = config.tool_path(tool)?;
        let mut cmd = Command::new(&path);
        cmd.env("GOOS", &config.target.os)
            .env("GOARCH", &config.target.arch);
        if let Some(goroot) = &config.goroot {
            cmd.env("GOROOT", goroot);
        }
        Ok(Self {
            cmd,
            tool,
            path,
            inputs_started: false,
        })
    }

    /// Set the import path of the package being compiled (`-p <path>`).
    pub fn package_path(&mut self, path: &str) -> &mut Self {
        self.cmd.arg("-p").arg(path);
        self
    }

    /// Set the import manifest (`-importcfg <file>`).
    pub fn importcfg(&mut self, manifest: &Path) -> &mut Self {
        self.cmd.arg("-importcfg").arg(manifest);
        self
    }

    /// Set the output file (`-o <file>`).
    pub fn output(&mut self, path: &Path) -> &mut Self {
        self.cmd.arg("-o").arg(path);
        self
    }

    /// Append input files after a `--` separator.
    pub fn inputs<I, P>(&mut self, files: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<OsStr>,
    {
        if !self.inputs_started {
            self.cmd.arg("--");
            self.inputs_started = true;
        }
        self.cmd.args(files);
        self
    }

    /// Run the tool, passing its output through, and fail if it fails.
    pub fn run_checked(&mut self) -> Result<(), BuildError> {
        vprintln!("  {}", self.command_line());
        let _t = Timer::start(self.tool.name());

        let status = self.cmd.status().map_err(|source| BuildError::ToolNotFound {
            tool: self.path.clone(),
            source,
        })?;
        if !status.success() {
            return Err(BuildError::ToolFailed {
                tool: self.path.clone(),
                code: status.code(),
            });
        }
        Ok(())
    }

    fn command_line(&self) -> String {
        std::iter::once(self.cmd.get_program())
            .chain(self.cmd.get_args())
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
