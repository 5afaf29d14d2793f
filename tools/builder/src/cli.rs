//! Command-line interface definitions for the builder.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::manifest::ArtifactMap;

/// Builds Go archives, binaries and test binaries by driving the Go
/// compiler and linker directly.
#[derive(Parser)]
#[command(name = "builder", version, about)]
pub struct Cli {
    /// Action to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Go installation root.
    #[arg(long, env = "GOROOT", global = true)]
    pub goroot: Option<PathBuf>,

    /// Target operating system (defaults to the host).
    #[arg(long, env = "GOOS", global = true)]
    pub goos: Option<String>,

    /// Target architecture (defaults to the host).
    #[arg(long, env = "GOARCH", global = true)]
    pub goarch: Option<String>,

    /// Operating system the Go tools run on.
    #[arg(long, env = "GOHOSTOS", global = true)]
    pub gohostos: Option<String>,

    /// Architecture the Go tools run on.
    #[arg(long, env = "GOHOSTARCH", global = true)]
    pub gohostarch: Option<String>,

    /// Directory containing `compile` and `link`
    /// (default: $GOROOT/pkg/tool/<hostos>_<hostarch>).
    #[arg(long, env = "GOTOOLDIR", global = true)]
    pub tool_dir: Option<PathBuf>,

    /// Extra build tags, comma separated.
    #[arg(long, global = true, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Print errors only.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print constraint decisions, manifests, tool command lines and timings.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Available actions.
#[derive(Subcommand)]
pub enum Command {
    /// Compile a package into an archive.
    Compile(CompileArgs),
    /// Link a main package archive into an executable.
    Link(LinkArgs),
    /// Build a test executable from a package's sources and tests.
    Test(TestArgs),
    /// Index the standard library archives into a manifest.
    Stdimportcfg(StdImportcfgArgs),
}

/// Arguments for the `compile` action.
#[derive(Parser)]
pub struct CompileArgs {
    /// Manifest of standard library archives.
    #[arg(long)]
    pub stdimportcfg: PathBuf,

    /// Direct dependency, as `importpath=file` (repeatable).
    #[arg(long = "arc", value_parser = parse_archive)]
    pub archives: Vec<Archive>,

    /// Import path of the package being compiled.
    #[arg(short = 'p')]
    pub package_path: Option<String>,

    /// Archive to produce.
    #[arg(short = 'o')]
    pub output: PathBuf,

    /// Go source files.
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,
}

/// Arguments for the `link` action.
#[derive(Parser)]
pub struct LinkArgs {
    /// Manifest of standard library archives.
    #[arg(long)]
    pub stdimportcfg: PathBuf,

    /// Dependency, including transitive ones, as `importpath=file` (repeatable).
    #[arg(long = "arc", value_parser = parse_archive)]
    pub archives: Vec<Archive>,

    /// Archive of the main package.
    #[arg(long)]
    pub main: PathBuf,

    /// Executable to produce.
    #[arg(short = 'o')]
    pub output: PathBuf,
}

/// Arguments for the `test` action.
#[derive(Parser)]
pub struct TestArgs {
    /// Manifest of standard library archives.
    #[arg(long)]
    pub stdimportcfg: PathBuf,

    /// Direct dependency of the package under test, as `importpath=file`.
    #[arg(long, value_parser = parse_archive)]
    pub direct: Vec<Archive>,

    /// Transitive dependency needed at link time, as `importpath=file`.
    #[arg(long, value_parser = parse_archive)]
    pub transitive: Vec<Archive>,

    /// Import path of the package under test.
    #[arg(short = 'p', default_value = "default")]
    pub package_path: String,

    /// Directory the test binary changes into before running tests.
    #[arg(long, default_value = ".")]
    pub dir: String,

    /// Test executable to produce.
    #[arg(short = 'o')]
    pub output: PathBuf,

    /// Library and test source files.
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,
}

/// Arguments for the `stdimportcfg` action.
#[derive(Parser)]
pub struct StdImportcfgArgs {
    /// Directory of standard library archives
    /// (default: $GOROOT/pkg/<goos>_<goarch>).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Manifest to produce.
    #[arg(short = 'o')]
    pub output: PathBuf,
}

/// An `importpath=file` pair naming a compiled dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub import_path: String,
    pub file: PathBuf,
}

/// Collect archive pairs into a map; later pairs win.
pub fn archive_map(archives: &[Archive]) -> ArtifactMap {
    archives
        .iter()
        .map(|a| (a.import_path.clone(), a.file.clone()))
        .collect()
}

/// Parse `importpath=file`. The split is on the first `=`.
pub fn parse_archive(s: &str) -> Result<Archive, String> {
    let Some((import_path, file)) = s.split_once('=') else {
        return Err(format!("expected importpath=file, got {s:?}"));
    };
    if import_path.is_empty() {
        return Err(format!("empty import path in {s:?}"));
    }
    if file.is_empty() {
        return Err(format!("empty file in {s:?}"));
    }
    Ok(Archive {
        import_path: import_path.to_string(),
        file: PathBuf::from(file),
    })
}
