//! Per-invocation build configuration.
//!
//! [`BuildConfig`] is assembled once from the parsed command line (which has
//! already folded in `GOROOT`, `GOOS` and friends from the environment) and
//! then passed by reference to every action.

use std::path::PathBuf;

use crate::cli::Cli;
use crate::constraint::BuildContext;
use crate::error::BuildError;
use crate::toolchain::Tool;

/// An operating system / architecture pair in Go's naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    /// The platform this process is running on.
    pub fn host() -> Self {
        Self {
            os: go_os(std::env::consts::OS).to_string(),
            arch: go_arch(std::env::consts::ARCH).to_string(),
        }
    }

    /// `<os>_<arch>`, as used in `pkg/` and `pkg/tool/` directory names.
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }
}

fn go_os(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn go_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        other => other,
    }
}

/// Immutable configuration for one builder invocation.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub goroot: Option<PathBuf>,
    /// Platform the produced code runs on.
    pub target: Platform,
    /// Platform the Go tools run on.
    pub host: Platform,
    pub tool_dir: Option<PathBuf>,
    pub tags: Vec<String>,
}

impl BuildConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        let running = Platform::host();
        let host = Platform {
            os: cli.gohostos.clone().unwrap_or_else(|| running.os.clone()),
            arch: cli.gohostarch.clone().unwrap_or_else(|| running.arch.clone()),
        };
        let target = Platform {
            os: cli.goos.clone().unwrap_or_else(|| host.os.clone()),
            arch: cli.goarch.clone().unwrap_or_else(|| host.arch.clone()),
        };
        Self {
            goroot: cli.goroot.clone(),
            target,
            host,
            tool_dir: cli.tool_dir.clone(),
            tags: cli
                .tags
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Constraint evaluation context for the target platform.
    pub fn context(&self) -> BuildContext {
        BuildContext::new(&self.target.os, &self.target.arch, self.tags.iter().cloned())
    }

    fn goroot(&self, what: &str) -> Result<&PathBuf, BuildError> {
        self.goroot
            .as_ref()
            .ok_or_else(|| BuildError::Usage(format!("GOROOT is not set (needed to locate {what})")))
    }

    /// Path of the `compile` or `link` binary.
    pub fn tool_path(&self, tool: Tool) -> Result<PathBuf, BuildError> {
        let exe = if self.host.os == "windows" {
            format!("{}.exe", tool.name())
        } else {
            tool.name().to_string()
        };
        let dir = match &self.tool_dir {
            Some(dir) => dir.clone(),
            None => self
                .goroot(tool.name())?
                .join("pkg")
                .join("tool")
                .join(self.host.dir_name()),
        };
        Ok(dir.join(exe))
    }

    /// Default location of the standard library archives.
    pub fn std_pkg_dir(&self) -> Result<PathBuf, BuildError> {
        Ok(self
            .goroot("the standard library")?
            .join("pkg")
            .join(self.target.dir_name()))
    }
}
