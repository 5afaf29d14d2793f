//! Error taxonomy for builder actions.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// An import that could not be mapped to an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedImport {
    /// Source file containing the import declaration.
    pub file: PathBuf,
    /// The imported package path, as written.
    pub import: String,
    pub reason: UnresolvedReason,
}

/// Why an import has no artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// No tier provides an archive for the package path.
    NotProvided,
    /// `import "C"`; cgo is not supported.
    Cgo,
}

impl fmt::Display for UnresolvedImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            UnresolvedReason::NotProvided => write!(
                f,
                "{}: import {:?} is not provided by any direct dependency",
                self.file.display(),
                self.import
            ),
            UnresolvedReason::Cgo => {
                write!(f, "{}: cgo not supported (import \"C\")", self.file.display())
            }
        }
    }
}

/// Errors produced while classifying, resolving, synthesizing, or invoking
/// the toolchain.
#[derive(Debug)]
pub enum BuildError {
    /// Malformed invocation or missing required input.
    Usage(String),
    /// A source file could not be scanned.
    Parse {
        file: PathBuf,
        line: usize,
        col: usize,
        message: String,
    },
    /// Every import (across all files) without a known artifact.
    UnresolvedImports(Vec<UnresolvedImport>),
    /// Test sources disagree on the base package name.
    PackageMismatch {
        file: PathBuf,
        found: String,
        expected: String,
        first_file: PathBuf,
    },
    /// Both the internal and the external test package define `TestMain`.
    RunnerConflict {
        internal: Vec<PathBuf>,
        external: Vec<PathBuf>,
    },
    /// Constraints excluded every source file.
    NoBuildableFiles(Vec<PathBuf>),
    /// A manifest line could not be understood.
    Format { line: usize, message: String },
    /// The compiler or linker binary could not be started.
    ToolNotFound { tool: PathBuf, source: io::Error },
    /// The compiler or linker exited unsuccessfully.
    ToolFailed { tool: PathBuf, code: Option<i32> },
    /// Filesystem failure on a builder-owned path.
    Io { path: PathBuf, source: io::Error },
}

impl BuildError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error.
    ///
    /// A failing tool's own exit code is propagated when it has one.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::ToolFailed { code: Some(code), .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(msg) => write!(f, "usage: {msg}"),
            Self::Parse {
                file,
                line,
                col,
                message,
            } => write!(f, "{}:{line}:{col}: {message}", file.display()),
            Self::UnresolvedImports(imports) => {
                write!(f, "{} unresolved import(s):", imports.len())?;
                for imp in imports {
                    write!(f, "\n  {imp}")?;
                }
                Ok(())
            }
            Self::PackageMismatch {
                file,
                found,
                expected,
                first_file,
            } => write!(
                f,
                "{}: package name {found:?} does not match package name {expected:?} in file {}",
                file.display(),
                first_file.display()
            ),
            Self::RunnerConflict { internal, external } => {
                write!(f, "TestMain defined in both internal and external test files")?;
                let names = |files: &[PathBuf]| {
                    files
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                write!(f, " (internal: {}; external: {})", names(internal), names(external))
            }
            Self::NoBuildableFiles(files) => {
                write!(f, "build constraints exclude all Go files")?;
                if !files.is_empty() {
                    let names: Vec<String> =
                        files.iter().map(|p| p.display().to_string()).collect();
                    write!(f, " ({})", names.join(", "))?;
                }
                Ok(())
            }
            Self::Format { line, message } => write!(f, "importcfg line {line}: {message}"),
            Self::ToolNotFound { tool, source } => {
                write!(f, "could not run {}: {source}", tool.display())
            }
            Self::ToolFailed { tool, code } => match code {
                Some(code) => write!(f, "{} exited with status {code}", tool.display()),
                None => write!(f, "{} was terminated by a signal", tool.display()),
            },
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ToolNotFound { source, .. } | Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
